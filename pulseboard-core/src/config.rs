use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Top-level configuration for the metrics pipeline.
///
/// Values layer in order: serde defaults, then an optional TOML file,
/// then `PULSE_`-prefixed environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PulseConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub transform: TransformConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Consult {base_url}/health on failure to tell "down" from "empty".
    #[serde(default = "default_true")]
    pub probe_health_on_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    /// Consecutive failures before the poller reports Degraded instead
    /// of oscillating between Loading and Error.
    #[serde(default = "default_degraded_threshold")]
    pub degraded_threshold: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Success rate above which an agent counts toward the
    /// active-agents KPI.
    #[serde(default = "default_active_threshold")]
    pub active_success_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Average response time assumed when an agent reports requests
    /// but no duration counter.
    #[serde(default = "default_avg_response_ms")]
    pub default_avg_response_ms: f64,

    #[serde(default = "default_cost_per_1k_tokens")]
    pub cost_per_1k_tokens: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_fetch_timeout() -> u64 {
    8
}

fn default_poll_interval() -> u64 {
    30
}

fn default_degraded_threshold() -> u32 {
    3
}

fn default_top_n() -> usize {
    5
}

fn default_active_threshold() -> f64 {
    0.8
}

fn default_avg_response_ms() -> f64 {
    850.0
}

fn default_cost_per_1k_tokens() -> f64 {
    0.003
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fetch_timeout_secs: default_fetch_timeout(),
            probe_health_on_failure: true,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            degraded_threshold: default_degraded_threshold(),
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            active_success_threshold: default_active_threshold(),
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            default_avg_response_ms: default_avg_response_ms(),
            cost_per_1k_tokens: default_cost_per_1k_tokens(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl PulseConfig {
    /// Load configuration from an optional file plus environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder = builder.add_source(Environment::with_prefix("PULSE").separator("__"));

        let config: PulseConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.endpoint.base_url.is_empty() {
            return Err(ConfigLoadError::InvalidValue {
                key: "endpoint.base_url".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.endpoint.fetch_timeout_secs == 0 {
            return Err(ConfigLoadError::InvalidValue {
                key: "endpoint.fetch_timeout_secs".to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }
        if self.polling.interval_secs == 0 {
            return Err(ConfigLoadError::InvalidValue {
                key: "polling.interval_secs".to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.aggregation.active_success_threshold) {
            return Err(ConfigLoadError::InvalidValue {
                key: "aggregation.active_success_threshold".to_string(),
                message: "must be between 0.0 and 1.0".to_string(),
            });
        }
        Ok(())
    }
}

/// Initialize the global tracing subscriber from logging config.
///
/// Safe to call once per process; later calls are ignored.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber was already initialized");
    }
}
