/// Configuration loading from TOML file + environment
use ::config::{Config as Layered, Environment, File, FileFormat};
use std::path::Path;
use tracing::warn;

use crate::chart::interval_minutes;
use crate::error::{MonitorError, Result};
use crate::types::Config;

/// Prefix for environment overrides, e.g. `PIVOT_SYMBOL=QQQ`
pub const ENV_PREFIX: &str = "PIVOT";

/// Load `path` (optional) layered under `PIVOT_*` variables, then validate
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let file = File::from(path.as_ref())
        .format(FileFormat::Toml)
        .required(false);
    build(file, env_source())
}

/// Parse a TOML document without consulting the environment
pub fn load_config_str(toml: &str) -> Result<Config> {
    build(File::from_str(toml, FileFormat::Toml), None)
}

fn env_source() -> Option<Environment> {
    Some(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("intervals"),
    )
}

fn build<S>(file: S, env: Option<Environment>) -> Result<Config>
where
    S: ::config::Source + Send + Sync + 'static,
{
    let mut builder = Layered::builder().add_source(file);
    if let Some(env) = env {
        builder = builder.add_source(env);
    }

    let mut config: Config = builder.build()?.try_deserialize()?;
    config.symbol = config.symbol.trim().to_uppercase();

    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<()> {
    // Backend
    if !(config.endpoint.starts_with("http://") || config.endpoint.starts_with("https://")) {
        return Err(MonitorError::ConfigError(format!(
            "endpoint must be an http(s) url: {:?}",
            config.endpoint
        )));
    }

    if config.request_timeout_sec == 0 {
        return Err(MonitorError::ConfigError("request_timeout_sec must be > 0".to_string()));
    }

    // Request
    if config.symbol.is_empty() {
        return Err(MonitorError::ConfigError("symbol is empty".to_string()));
    }

    if config.intervals.is_empty() {
        return Err(MonitorError::ConfigError("intervals is empty".to_string()));
    }

    for label in &config.intervals {
        interval_minutes(label)
            .map_err(|e| MonitorError::ConfigError(format!("intervals: {}", e)))?;
        if !config.period_map.contains_key(label) {
            warn!("No period_map entry for {} - backend default applies", label);
        }
    }

    if config.log_level.trim().is_empty() {
        return Err(MonitorError::ConfigError("log_level is empty".to_string()));
    }

    Ok(())
}
