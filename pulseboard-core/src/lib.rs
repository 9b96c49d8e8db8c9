//! Pulseboard core: client-side performance metrics pipeline for a
//! fleet of task-executing agents.
//!
//! Data flows one way: fetcher → transformer (trend synthesis fills
//! gaps) → aggregator → read-only snapshot. The [`MetricsPoller`]
//! drives the cycle on a fixed interval and owns the snapshot;
//! [`DashboardState`] layers selection and view-mode handling on top
//! for the presentation layer.

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod view;

pub use config::{
    init_logging, AggregationConfig, ConfigLoadError, EndpointConfig, LoggingConfig,
    PollingConfig, PulseConfig, TransformConfig,
};
pub use error::{PulseError, PulseResult};
pub use metrics::{
    classify_agent, fallback_roster, requests_per_minute, split_error_breakdown, transform,
    ComparisonRow, CounterSource, DashboardSnapshot, FetchOutcome, FleetAggregator, FleetKpis,
    FleetOverview, HttpMetricsFetcher, MetricsPoller, PollState, TransformOptions,
    TrendSynthesizer, DEFAULT_SPACING_MINUTES, DEFAULT_TREND_POINTS, GENERAL_AGENT_TYPE,
};
pub use models::{
    AgentMetricsResponse, AgentPerformance, ErrorStats, Percentiles, RawAgentCounters,
    ResourceStats, ResponseTimeStats, SuccessRateStats, ThroughputStats, TimeSeries, TrendPoint,
};
pub use view::{DashboardState, ViewData, ViewMode};
