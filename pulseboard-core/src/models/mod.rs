mod performance;
mod raw;

pub use performance::{
    AgentPerformance, ErrorStats, Percentiles, ResourceStats, ResponseTimeStats, SuccessRateStats,
    ThroughputStats, TimeSeries, TrendPoint,
};
pub use raw::{AgentMetricsResponse, RawAgentCounters};
