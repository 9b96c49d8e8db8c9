//! Error types for the Pulseboard core library.
//!
//! # Error Codes Reference
//!
//! | Code Range | Category | Description |
//! |------------|----------|-------------|
//! | E1001-E1099 | Network | Connectivity, timeout, and HTTP status errors |
//! | E2001-E2099 | Schema | Malformed or unexpected payloads |
//! | E3001-E3099 | Data | Dataset-level conditions (empty, inconsistent) |
//! | E4001-E4099 | Config | Configuration loading and validation errors |
//! | E5001-E5099 | General | Internal and lifecycle errors |

use thiserror::Error;

/// Unified error type for every pipeline operation.
///
/// No variant here is fatal to a hosting application: the poller maps
/// all of them into a degraded-but-renderable state.
#[derive(Debug, Clone, Error)]
pub enum PulseError {
    // ========================================================================
    // Network Errors (E1001-E1099)
    // ========================================================================
    /// The monitoring endpoint could not be reached
    #[error("[E1001] Request to {url} failed: {message}")]
    RequestFailed { url: String, message: String },

    /// The request exceeded the configured timeout
    #[error("[E1002] Request to {url} timed out after {timeout_secs} seconds")]
    RequestTimeout { url: String, timeout_secs: u64 },

    /// The endpoint answered with a non-success status
    #[error("[E1003] Endpoint {url} returned status {status}")]
    UnexpectedStatus { url: String, status: u16 },

    // ========================================================================
    // Schema Errors (E2001-E2099)
    // ========================================================================
    /// The response body could not be decoded into the expected shape
    #[error("[E2001] Failed to decode metrics payload: {0}")]
    MalformedPayload(String),

    // ========================================================================
    // Data Errors (E3001-E3099)
    // ========================================================================
    /// The backend answered successfully but reported zero agents
    #[error("[E3001] Backend returned no agent data")]
    EmptyDataset,

    // ========================================================================
    // Configuration Errors (E4001-E4099)
    // ========================================================================
    /// Invalid configuration value
    #[error("[E4001] Invalid configuration value for '{key}': {message}")]
    InvalidConfigValue { key: String, message: String },

    // ========================================================================
    // General Errors (E5001-E5099)
    // ========================================================================
    /// The poller was asked to start while already running
    #[error("[E5001] Poller is already running")]
    PollerAlreadyRunning,

    /// Internal error
    #[error("[E5002] Internal error: {0}")]
    Internal(String),
}

impl PulseError {
    /// Returns true for connectivity-level failures (timeouts included).
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PulseError::RequestFailed { .. }
                | PulseError::RequestTimeout { .. }
                | PulseError::UnexpectedStatus { .. }
        )
    }

    /// Returns true when the payload arrived but could not be understood.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, PulseError::MalformedPayload(_))
    }

    /// Returns true when the backend is healthy but unpopulated.
    pub fn is_empty_dataset(&self) -> bool {
        matches!(self, PulseError::EmptyDataset)
    }

    /// Transient errors are retried on the next poll tick.
    pub fn is_transient(&self) -> bool {
        self.is_network_error() || self.is_empty_dataset()
    }

    /// Short label for status displays.
    pub fn status_indicator(&self) -> &'static str {
        match self {
            PulseError::RequestFailed { .. } => "Offline",
            PulseError::RequestTimeout { .. } => "Timeout",
            PulseError::UnexpectedStatus { .. } => "Backend Error",
            PulseError::MalformedPayload(_) => "Bad Payload",
            PulseError::EmptyDataset => "No Data",
            PulseError::InvalidConfigValue { .. } => "Config Error",
            PulseError::PollerAlreadyRunning | PulseError::Internal(_) => "Error",
        }
    }
}

pub type PulseResult<T> = Result<T, PulseError>;
