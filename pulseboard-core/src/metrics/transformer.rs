use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::warn;

use crate::config::TransformConfig;
use crate::models::{
    AgentPerformance, ErrorStats, Percentiles, RawAgentCounters, ResourceStats, ResponseTimeStats,
    SuccessRateStats, ThroughputStats,
};

use super::trend::TrendSynthesizer;

pub const GENERAL_AGENT_TYPE: &str = "general-agent";

/// Known agent specializations, matched against the agent id. The
/// longest matching keyword wins; unmatched ids fall back to
/// `general-agent`.
const AGENT_TYPE_LEXICON: &[(&str, &str)] = &[
    ("review", "code-review-agent"),
    ("test", "testing-agent"),
    ("doc", "documentation-agent"),
    ("deploy", "deployment-agent"),
    ("security", "security-agent"),
    ("research", "research-agent"),
    ("data", "data-analysis-agent"),
    ("refactor", "refactoring-agent"),
];

/// Fixed multipliers for estimated latency percentiles. Chosen so that
/// p50 <= average <= p95 <= p99 holds by construction.
const P50_MULTIPLIER: f64 = 0.8;
const P95_MULTIPLIER: f64 = 1.5;
const P99_MULTIPLIER: f64 = 2.2;

/// Proportional error-category split, in percent. The `resource`
/// category absorbs the integer remainder so the buckets always sum
/// exactly to the error count.
const TIMEOUT_SHARE_PCT: i64 = 30;
const VALIDATION_SHARE_PCT: i64 = 20;
const EXECUTION_SHARE_PCT: i64 = 40;

#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub default_avg_response_ms: f64,
    pub cost_per_1k_tokens: f64,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            default_avg_response_ms: 850.0,
            cost_per_1k_tokens: 0.003,
        }
    }
}

impl From<&TransformConfig> for TransformOptions {
    fn from(config: &TransformConfig) -> Self {
        Self {
            default_avg_response_ms: config.default_avg_response_ms,
            cost_per_1k_tokens: config.cost_per_1k_tokens,
        }
    }
}

/// Derive a performance record from raw counters. Pure: no I/O, no
/// shared state, `now` supplied by the caller.
pub fn transform(
    raw: &RawAgentCounters,
    now: DateTime<Utc>,
    opts: &TransformOptions,
) -> AgentPerformance {
    let requests = sanitize_counter(&raw.agent_id, "requests", raw.requests);
    let errors = sanitize_counter(&raw.agent_id, "errors", raw.errors);
    let total_duration_ms = sanitize_counter(&raw.agent_id, "totalDurationMs", raw.total_duration_ms);
    let total_tokens = sanitize_counter(&raw.agent_id, "totalTokens", raw.total_tokens);

    let agent_type = classify_agent(&raw.agent_id);
    let synthesizer = TrendSynthesizer::for_agent(&raw.agent_id);

    let average_ms = average_response_ms(requests, total_duration_ms, opts);
    let error_rate = (errors as f64 / requests.max(1) as f64).clamp(0.0, 1.0);
    let success_current = 1.0 - error_rate;
    let rpm = requests_per_minute(requests, raw.last_used_at, now);

    AgentPerformance {
        agent_id: raw.agent_id.clone(),
        agent_type: agent_type.to_string(),
        response_time: ResponseTimeStats {
            average_ms,
            percentiles: Percentiles::Estimated {
                p50: average_ms * P50_MULTIPLIER,
                p95: average_ms * P95_MULTIPLIER,
                p99: average_ms * P99_MULTIPLIER,
            },
            trend: synthesizer.synthesize_default(average_ms, None, now),
        },
        success_rate: SuccessRateStats {
            current: success_current,
            trend: synthesizer.synthesize_default(success_current, Some((0.0, 1.0)), now),
        },
        throughput: ThroughputStats {
            requests_per_minute: rpm,
            trend: synthesizer.synthesize_default(rpm, None, now),
        },
        resources: derive_resources(raw.is_active, rpm, total_tokens, opts),
        errors: ErrorStats {
            count: errors,
            rate: error_rate,
            breakdown: split_error_breakdown(errors),
        },
        task_distribution: task_distribution_for(agent_type),
        is_active: raw.is_active,
        last_used_at: raw.last_used_at,
        total_tokens,
        total_requests: requests,
    }
}

/// Keyword lookup against the specialization lexicon; longest match
/// wins, earlier entries break length ties.
pub fn classify_agent(agent_id: &str) -> &'static str {
    let id = agent_id.to_lowercase();
    let mut best: Option<(&str, &str)> = None;

    for &(keyword, agent_type) in AGENT_TYPE_LEXICON {
        if id.contains(keyword) {
            match best {
                Some((current, _)) if keyword.len() <= current.len() => {}
                _ => best = Some((keyword, agent_type)),
            }
        }
    }

    best.map(|(_, agent_type)| agent_type)
        .unwrap_or(GENERAL_AGENT_TYPE)
}

/// Split an error count into fixed categories. Integer floor for the
/// first three shares; the resource bucket absorbs the remainder so
/// the sum is always exact.
pub fn split_error_breakdown(count: i64) -> BTreeMap<String, i64> {
    let count = count.max(0);
    let timeout = count * TIMEOUT_SHARE_PCT / 100;
    let validation = count * VALIDATION_SHARE_PCT / 100;
    let execution = count * EXECUTION_SHARE_PCT / 100;
    let resource = count - timeout - validation - execution;

    let mut breakdown = BTreeMap::new();
    breakdown.insert("timeout".to_string(), timeout);
    breakdown.insert("validation".to_string(), validation);
    breakdown.insert("execution".to_string(), execution);
    breakdown.insert("resource".to_string(), resource);
    breakdown
}

/// Requests per minute derived from the request count and the recency
/// of last use. Zero whenever the agent has no requests or no recorded
/// last use.
pub fn requests_per_minute(
    requests: i64,
    last_used_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    let Some(last_used) = last_used_at else {
        return 0.0;
    };
    if requests <= 0 {
        return 0.0;
    }

    let hours_since = (now - last_used).num_milliseconds() as f64 / 3_600_000.0;
    requests as f64 / hours_since.max(1.0) / 60.0
}

fn average_response_ms(requests: i64, total_duration_ms: i64, opts: &TransformOptions) -> f64 {
    if total_duration_ms > 0 {
        total_duration_ms as f64 / requests.max(1) as f64
    } else if requests > 0 {
        // Duration counter unknown; assume the configured default.
        opts.default_avg_response_ms
    } else {
        0.0
    }
}

/// Resource figures are deterministic estimates from counters, not
/// host samples: cost is priced from token volume, load figures scale
/// with throughput.
fn derive_resources(
    is_active: bool,
    rpm: f64,
    total_tokens: i64,
    opts: &TransformOptions,
) -> ResourceStats {
    let base_cpu = if is_active { 12.0 } else { 2.0 };
    ResourceStats {
        cpu_usage: (base_cpu + rpm * 1.8).min(95.0),
        memory_usage: (256.0 + total_tokens as f64 / 2048.0).min(4096.0),
        cost: total_tokens as f64 / 1000.0 * opts.cost_per_1k_tokens,
    }
}

fn task_distribution_for(agent_type: &str) -> BTreeMap<String, f64> {
    let weights: &[(&str, f64)] = match agent_type {
        "code-review-agent" => &[("code-review", 0.6), ("refactoring", 0.25), ("other", 0.15)],
        "testing-agent" => &[("test-authoring", 0.5), ("test-execution", 0.35), ("other", 0.15)],
        "documentation-agent" => &[("writing", 0.55), ("editing", 0.3), ("other", 0.15)],
        "deployment-agent" => &[("deployment", 0.65), ("rollback", 0.2), ("other", 0.15)],
        "security-agent" => &[("audit", 0.5), ("patching", 0.3), ("other", 0.2)],
        "research-agent" => &[("research", 0.7), ("summarization", 0.2), ("other", 0.1)],
        "data-analysis-agent" => &[("analysis", 0.6), ("reporting", 0.25), ("other", 0.15)],
        "refactoring-agent" => &[("refactoring", 0.7), ("code-review", 0.2), ("other", 0.1)],
        _ => &[("general", 0.5), ("analysis", 0.3), ("other", 0.2)],
    };

    weights
        .iter()
        .map(|&(task, weight)| (task.to_string(), weight))
        .collect()
}

fn sanitize_counter(agent_id: &str, field: &str, value: i64) -> i64 {
    if value < 0 {
        warn!(agent_id, field, value, "Negative counter in raw metrics, defaulting to zero");
        0
    } else {
        value
    }
}
