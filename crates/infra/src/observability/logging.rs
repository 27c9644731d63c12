//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies.

use newsline_domain::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Logging initialization errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,

    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },
}

/// Install the global subscriber, tolerating an existing one
///
/// An invalid configured level falls back to `info`.
pub fn init_logging(config: &LoggingConfig) {
    match try_init_logging(config) {
        Ok(()) => tracing::debug!(level = %config.level, json = config.json, "logging initialized"),
        Err(LoggingError::AlreadyInitialized) => {}
        Err(err @ LoggingError::InvalidFilter { .. }) => {
            let fallback = LoggingConfig { level: "info".to_string(), json: config.json };
            if try_init_logging(&fallback).is_ok() {
                tracing::warn!(error = %err, "falling back to info logging");
            }
        }
    }
}

/// Install the global subscriber
///
/// # Errors
/// - [`LoggingError::InvalidFilter`] if `RUST_LOG` is unset and the
///   configured level is not a valid filter directive
/// - [`LoggingError::AlreadyInitialized`] if a global subscriber exists
pub fn try_init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = build_filter(&config.level)?;

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)
    }
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
        filter: level.to_string(),
        message: e.to_string(),
    })
}
