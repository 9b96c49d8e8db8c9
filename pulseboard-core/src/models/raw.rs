use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw execution counters for one agent, as reported by the monitoring
/// endpoint. Every field may be missing on the wire and defaults to
/// zero/null; negative counters are tolerated here and clamped during
/// transformation.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawAgentCounters {
    #[serde(default)]
    pub agent_id: String,

    #[serde(default)]
    pub requests: i64,

    #[serde(default)]
    pub errors: i64,

    #[serde(default)]
    pub total_duration_ms: i64,

    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub is_active: bool,

    #[serde(default)]
    pub total_tokens: i64,
}

impl RawAgentCounters {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Default::default()
        }
    }
}

/// Envelope returned by `GET {base_url}/api/metrics/agents`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetricsResponse {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub total_agents: i64,

    #[serde(default)]
    pub active_agents: i64,

    #[serde(default)]
    pub metrics: Vec<RawAgentCounters>,
}
