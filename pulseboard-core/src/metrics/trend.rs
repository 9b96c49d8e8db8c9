use chrono::{DateTime, Duration, Utc};

use crate::models::{TimeSeries, TrendPoint};

pub const DEFAULT_TREND_POINTS: usize = 50;
pub const DEFAULT_SPACING_MINUTES: i64 = 5;

/// Relative amplitude of the synthesized variation around the baseline.
const JITTER_AMPLITUDE: f64 = 0.1;

/// Produces a fixed-length historical series when the backend supplies
/// none, so charts always have a renderable trend.
///
/// Output is fully deterministic for a given seed: the variation is a
/// phase-shifted sine around the baseline rather than sampled noise,
/// which keeps fallback rendering stable across test runs. Series are
/// flagged `synthetic`; measured history never goes through here.
#[derive(Debug, Clone, Copy)]
pub struct TrendSynthesizer {
    seed: u64,
}

impl TrendSynthesizer {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed derived from the agent id (FNV-1a), so each agent gets a
    /// distinct but reproducible trend shape.
    pub fn for_agent(agent_id: &str) -> Self {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in agent_id.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        Self::new(hash)
    }

    /// Generate `points` samples at fixed `spacing_minutes`, ending at
    /// `now`, each the baseline plus bounded variation, clamped to
    /// `bounds` when given.
    pub fn synthesize(
        &self,
        baseline: f64,
        points: usize,
        spacing_minutes: i64,
        bounds: Option<(f64, f64)>,
        now: DateTime<Utc>,
    ) -> TimeSeries {
        let spacing = spacing_minutes.max(1);
        let phase = (self.seed % 6283) as f64 / 1000.0;
        let amplitude = baseline.abs() * JITTER_AMPLITUDE;

        let samples: Vec<TrendPoint> = (0..points)
            .map(|i| {
                let offset = (points - 1 - i) as i64;
                let variation = (phase + i as f64 * 0.5).sin() * amplitude;
                let mut value = baseline + variation;
                if let Some((min, max)) = bounds {
                    value = value.max(min).min(max);
                }
                TrendPoint {
                    timestamp: now - Duration::minutes(spacing * offset),
                    value: value.max(0.0),
                }
            })
            .collect();

        TimeSeries {
            points: samples,
            synthetic: true,
        }
    }

    /// Default-shaped series: 50 points at 5-minute spacing.
    pub fn synthesize_default(
        &self,
        baseline: f64,
        bounds: Option<(f64, f64)>,
        now: DateTime<Utc>,
    ) -> TimeSeries {
        self.synthesize(
            baseline,
            DEFAULT_TREND_POINTS,
            DEFAULT_SPACING_MINUTES,
            bounds,
            now,
        )
    }
}
