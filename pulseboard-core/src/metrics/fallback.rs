use chrono::{DateTime, Duration, Utc};

use crate::models::RawAgentCounters;

/// Deterministic substitute roster used when the monitoring endpoint is
/// unreachable or returns garbage. Fixed literal counters (no
/// randomness) keep fallback rendering and tests reproducible; only
/// the recency offsets are anchored to the supplied `now`.
pub fn fallback_roster(now: DateTime<Utc>) -> Vec<RawAgentCounters> {
    vec![
        RawAgentCounters {
            agent_id: "code-reviewer".to_string(),
            requests: 142,
            errors: 5,
            total_duration_ms: 117_800,
            last_used_at: Some(now - Duration::minutes(12)),
            is_active: true,
            total_tokens: 64_500,
        },
        RawAgentCounters {
            agent_id: "test-runner".to_string(),
            requests: 96,
            errors: 11,
            total_duration_ms: 128_600,
            last_used_at: Some(now - Duration::minutes(35)),
            is_active: true,
            total_tokens: 41_200,
        },
        RawAgentCounters {
            agent_id: "doc-writer".to_string(),
            requests: 38,
            errors: 1,
            total_duration_ms: 26_900,
            last_used_at: Some(now - Duration::hours(3)),
            is_active: false,
            total_tokens: 18_750,
        },
        RawAgentCounters {
            agent_id: "security-auditor".to_string(),
            requests: 21,
            errors: 2,
            total_duration_ms: 44_100,
            last_used_at: Some(now - Duration::hours(8)),
            is_active: false,
            total_tokens: 12_300,
        },
        RawAgentCounters {
            agent_id: "task-orchestrator".to_string(),
            requests: 0,
            errors: 0,
            total_duration_ms: 0,
            last_used_at: None,
            is_active: false,
            total_tokens: 0,
        },
    ]
}
