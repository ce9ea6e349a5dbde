//! # FL Telemetry - Logging Bootstrap
//!
//! Structured logging setup shared by the API and worker processes. Output
//! is `tracing` with an env-filter; JSON formatting is available for log
//! shippers that want machine-parsable lines.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Telemetry setup errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured log filter did not parse.
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// The offending filter string.
        filter: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service identity included in log context.
    pub service_name: String,
    /// Default log filter when `RUST_LOG` is unset (e.g. `info`).
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "fl-engine".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Load overrides from `FL_LOG_LEVEL` / `FL_LOG_JSON`.
    #[must_use]
    pub fn from_env(service_name: &str) -> Self {
        let defaults = Self::default();
        Self {
            service_name: service_name.to_string(),
            log_level: std::env::var("FL_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logs: std::env::var("FL_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.json_logs),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Idempotent: if a
/// subscriber is already installed, the existing one is kept.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] if the configured level does
/// not parse as an env-filter.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::InvalidFilter {
            filter: config.log_level.clone(),
            reason: e.to_string(),
        })
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if installed.is_ok() {
        tracing::info!(
            service = %config.service_name,
            json_logs = config.json_logs,
            "Telemetry initialized"
        );
    }

    Ok(())
}
