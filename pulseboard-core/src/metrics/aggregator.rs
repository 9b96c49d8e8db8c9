use serde::{Deserialize, Serialize};

use crate::config::AggregationConfig;
use crate::models::AgentPerformance;

/// One row of the side-by-side comparison table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonRow {
    pub name: String,
    pub response_time_ms: f64,
    pub success_rate_pct: f64,
    pub requests_per_minute: f64,
    pub cost: f64,
    pub error_rate_pct: f64,
}

/// Fleet-wide key performance indicators. All figures are zero (never
/// NaN) for an empty fleet.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FleetKpis {
    pub active_agents: usize,
    pub avg_response_time_ms: f64,
    pub total_cost: f64,
    pub avg_success_rate: f64,
}

/// Cross-agent rankings and KPIs for one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FleetOverview {
    pub top_performers: Vec<AgentPerformance>,
    pub comparison_rows: Vec<ComparisonRow>,
    pub kpis: FleetKpis,
}

/// Computes rankings and system-wide KPIs from a set of derived
/// performance records.
#[derive(Debug, Clone)]
pub struct FleetAggregator {
    top_n: usize,
    active_success_threshold: f64,
}

impl FleetAggregator {
    pub fn new(top_n: usize, active_success_threshold: f64) -> Self {
        Self {
            top_n,
            active_success_threshold,
        }
    }

    pub fn from_config(config: &AggregationConfig) -> Self {
        Self::new(config.top_n, config.active_success_threshold)
    }

    pub fn aggregate(&self, agents: &[AgentPerformance]) -> FleetOverview {
        FleetOverview {
            top_performers: self.top_performers(agents),
            comparison_rows: agents.iter().map(comparison_row).collect(),
            kpis: self.kpis(agents),
        }
    }

    /// Agents ranked by success rate descending, ties broken by average
    /// response time ascending. Stable for identical inputs.
    fn top_performers(&self, agents: &[AgentPerformance]) -> Vec<AgentPerformance> {
        let mut ranked: Vec<AgentPerformance> = agents.to_vec();
        ranked.sort_by(|a, b| {
            b.success_rate
                .current
                .partial_cmp(&a.success_rate.current)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.response_time
                        .average_ms
                        .partial_cmp(&b.response_time.average_ms)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        ranked.truncate(self.top_n);
        ranked
    }

    fn kpis(&self, agents: &[AgentPerformance]) -> FleetKpis {
        if agents.is_empty() {
            return FleetKpis::default();
        }

        let count = agents.len() as f64;
        FleetKpis {
            active_agents: agents
                .iter()
                .filter(|a| a.success_rate.current > self.active_success_threshold)
                .count(),
            avg_response_time_ms: agents
                .iter()
                .map(|a| a.response_time.average_ms)
                .sum::<f64>()
                / count,
            total_cost: agents.iter().map(|a| a.resources.cost).sum(),
            avg_success_rate: agents.iter().map(|a| a.success_rate.current).sum::<f64>() / count,
        }
    }
}

impl Default for FleetAggregator {
    fn default() -> Self {
        Self::from_config(&AggregationConfig::default())
    }
}

fn comparison_row(agent: &AgentPerformance) -> ComparisonRow {
    ComparisonRow {
        name: agent.agent_id.clone(),
        response_time_ms: agent.response_time.average_ms,
        success_rate_pct: agent.success_rate.current * 100.0,
        requests_per_minute: agent.throughput.requests_per_minute,
        cost: agent.resources.cost,
        error_rate_pct: agent.errors.rate * 100.0,
    }
}
