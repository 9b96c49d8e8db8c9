use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One sample on a metric trend line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Ordered, fixed-spacing series of trend samples ending at "now".
///
/// `synthetic` distinguishes generator output from measured history so
/// a chart can label it honestly. Measured samples always bypass the
/// synthesizer and carry `synthetic = false`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TimeSeries {
    pub points: Vec<TrendPoint>,
    pub synthetic: bool,
}

impl TimeSeries {
    pub fn measured(points: Vec<TrendPoint>) -> Self {
        Self {
            points,
            synthetic: false,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when timestamps are strictly increasing.
    pub fn is_ordered(&self) -> bool {
        self.points
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp)
    }

    pub fn latest_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }
}

/// Latency percentiles.
///
/// Only `Estimated` is produced today: p50/p95/p99 are derived from the
/// average via fixed multipliers, not order statistics. A histogram
/// backed `Measured` variant can replace it without changing callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Percentiles {
    Estimated { p50: f64, p95: f64, p99: f64 },
    Measured { p50: f64, p95: f64, p99: f64 },
}

impl Percentiles {
    pub fn p50(&self) -> f64 {
        match self {
            Percentiles::Estimated { p50, .. } | Percentiles::Measured { p50, .. } => *p50,
        }
    }

    pub fn p95(&self) -> f64 {
        match self {
            Percentiles::Estimated { p95, .. } | Percentiles::Measured { p95, .. } => *p95,
        }
    }

    pub fn p99(&self) -> f64 {
        match self {
            Percentiles::Estimated { p99, .. } | Percentiles::Measured { p99, .. } => *p99,
        }
    }

    pub fn is_estimated(&self) -> bool {
        matches!(self, Percentiles::Estimated { .. })
    }
}

impl Default for Percentiles {
    fn default() -> Self {
        Percentiles::Estimated {
            p50: 0.0,
            p95: 0.0,
            p99: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResponseTimeStats {
    pub average_ms: f64,
    pub percentiles: Percentiles,
    pub trend: TimeSeries,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SuccessRateStats {
    /// Current success rate in [0, 1].
    pub current: f64,
    pub trend: TimeSeries,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ThroughputStats {
    pub requests_per_minute: f64,
    pub trend: TimeSeries,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResourceStats {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ErrorStats {
    pub count: i64,
    /// Error rate in [0, 1].
    pub rate: f64,
    /// Category -> count; the values always sum exactly to `count`.
    pub breakdown: BTreeMap<String, i64>,
}

impl ErrorStats {
    pub fn breakdown_total(&self) -> i64 {
        self.breakdown.values().sum()
    }
}

/// Derived performance record for one agent, rebuilt wholesale on each
/// poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AgentPerformance {
    pub agent_id: String,
    pub agent_type: String,
    pub response_time: ResponseTimeStats,
    pub success_rate: SuccessRateStats,
    pub throughput: ThroughputStats,
    pub resources: ResourceStats,
    pub errors: ErrorStats,
    /// Task category -> weight; weights sum to ~1.0.
    pub task_distribution: BTreeMap<String, f64>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub total_tokens: i64,
    pub total_requests: i64,
}

impl AgentPerformance {
    pub fn status_label(&self) -> &'static str {
        if self.is_active {
            "Active"
        } else if self.last_used_at.is_some() {
            "Idle"
        } else {
            "Never Used"
        }
    }
}
