//! Configuration structures
//!
//! Every section implements `Default` and is `#[serde(default)]`, so a
//! config file only needs to list the values it overrides.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{ONBOARDING_REQUIRED_MARKER, REFRESH_PATH};
use crate::errors::NewslineError;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Total sends per gateway request. Above 1, unreachable-backend
    /// failures are re-sent, and so are 5xx responses and timeouts of
    /// idempotent methods. Refresh calls always use a single attempt.
    pub transport_attempts: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 30,
            transport_attempts: 1,
        }
    }
}

/// How the refresh token is presented to `POST /auth/refresh`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshBinding {
    /// `{"refreshToken": ..., "tokenFamily": ...}` JSON body
    #[default]
    Body,
    /// `Authorization: Bearer <refresh_token>` header, empty body
    Bearer,
}

impl FromStr for RefreshBinding {
    type Err = NewslineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "body" => Ok(Self::Body),
            "bearer" | "header" => Ok(Self::Bearer),
            other => Err(NewslineError::Config(format!("Unknown refresh binding: {other}"))),
        }
    }
}

/// Session and refresh settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub refresh_binding: RefreshBinding,
    pub refresh_path: String,
    /// Substring that marks a 403 body as "onboarding required"
    pub onboarding_marker: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_binding: RefreshBinding::Body,
            refresh_path: REFRESH_PATH.to_string(),
            onboarding_marker: ONBOARDING_REQUIRED_MARKER.to_string(),
        }
    }
}

/// Durable store location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: "newsline-session.json".to_string() }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
