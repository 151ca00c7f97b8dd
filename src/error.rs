/// Centralized error types for the pivot monitor
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    // Network Errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Backend returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    // Data Errors
    #[error("Deserialization failed: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Unknown interval: {0}")]
    UnknownInterval(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] ::config::ConfigError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // File I/O Errors
    #[error("File I/O error: {0}")]
    FileError(#[from] std::io::Error),

    // Scheduler Errors
    #[error("Fetch task failed: {0}")]
    TaskFailed(String),

    // Generic Errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    /// Transient failures that the next scheduled tick may clear
    pub fn is_recoverable(&self) -> bool {
        match self {
            MonitorError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            MonitorError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            MonitorError::NetworkTimeout(_) | MonitorError::TaskFailed(_) => true,
            _ => false,
        }
    }

    /// Decode failures, as opposed to transport failures
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, MonitorError::DeserializationError(_))
    }

    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            MonitorError::HttpError(_) => "NET_001",
            MonitorError::HttpStatus { .. } => "NET_002",
            MonitorError::NetworkTimeout(_) => "NET_003",
            MonitorError::DeserializationError(_) => "DATA_001",
            MonitorError::InvalidTimestamp(_) => "DATA_003",
            MonitorError::UnknownInterval(_) => "DATA_004",
            MonitorError::ConfigError(_) => "CFG_001",
            MonitorError::ConfigSource(_) => "CFG_002",
            MonitorError::InvalidParameter(_) => "CFG_003",
            MonitorError::FileError(_) => "FILE_001",
            MonitorError::TaskFailed(_) => "SCHED_002",
            MonitorError::InternalError(_) => "INT_001",
        }
    }
}
