//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over the configured filter when set.

use crate::config::{LogConfig, LogFormat};
use tracing_subscriber::EnvFilter;

/// Subscriber installation error
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter {filter:?}: {message}")]
    Filter { filter: String, message: String },

    #[error("failed to install subscriber: {0}")]
    Install(String),
}

/// Build the effective filter
///
/// # Errors
/// Returns error if neither `RUST_LOG` nor the configured directive parses
pub fn env_filter(log: &LogConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.filter))
        .map_err(|e| TelemetryError::Filter {
            filter: log.filter.clone(),
            message: e.to_string(),
        })
}

/// Install the global subscriber
///
/// # Errors
/// Returns error if the filter is invalid or a subscriber is already set
pub fn init(log: &LogConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(log)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match log.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| TelemetryError::Install(e.to_string()))?;

    tracing::debug!(filter = %log.filter, format = ?log.format, "telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_filter_parses() {
        let log = LogConfig {
            filter: "warn,ovl_engine=debug".into(),
            format: LogFormat::Json,
        };
        assert!(env_filter(&log).is_ok());
    }
}
