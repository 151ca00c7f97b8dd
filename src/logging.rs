/// Tracing subscriber setup shared by the binaries
use tracing_subscriber::EnvFilter;

use crate::error::{MonitorError, Result};
use crate::types::{Config, LogFormat};

/// `RUST_LOG` wins over the configured level
pub fn filter_for(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pivot_monitor={},warn", config.log_level.trim())))
}

pub fn init_logging(config: &Config) -> Result<()> {
    let filter = filter_for(config);

    let installed = match config.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).try_init(),
    };

    installed.map_err(|e| MonitorError::InternalError(format!("Logging init failed: {}", e)))
}
