//! API-specific error types
//!
//! Provides error classification for gateway operations with retry metadata.

use std::time::Duration;

use newsline_common::error::{ErrorClassification, ErrorSeverity};
use newsline_domain::NewslineError;
use thiserror::Error;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authentication errors (401 after the refresh retry)
    Authentication,
    /// Onboarding gate (403 with the onboarding marker)
    Onboarding,
    /// Rate limiting errors (429) - retry with backoff
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth) - non-retryable
    Client,
    /// Network/connection errors - retryable
    Network,
    /// Response body did not match the expected shape
    Decode,
    /// Configuration errors - non-retryable
    Config,
}

/// Gateway errors
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    OnboardingRequired(String),

    #[error("{message}")]
    Status { status: u16, message: String, body: Option<String> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::AuthenticationFailed(_) => ApiErrorCategory::Authentication,
            Self::OnboardingRequired(_) => ApiErrorCategory::Onboarding,
            Self::Status { status: 429, .. } => ApiErrorCategory::RateLimit,
            Self::Status { status, .. } if *status >= 500 => ApiErrorCategory::Server,
            Self::Status { .. } => ApiErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::Decode(_) => ApiErrorCategory::Decode,
            Self::Config(_) => ApiErrorCategory::Config,
        }
    }

    /// HTTP status carried by the error, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::AuthenticationFailed(_) => Some(401),
            Self::OnboardingRequired(_) => Some(403),
            _ => None,
        }
    }

    /// Check if this error should be retried
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::RateLimit | ApiErrorCategory::Server | ApiErrorCategory::Network
        )
    }

    /// Get suggested retry delay in seconds
    pub fn retry_delay_secs(&self) -> u64 {
        match self.category() {
            ApiErrorCategory::RateLimit => 60, // Wait for rate limit window
            ApiErrorCategory::Server => 10,    // Moderate delay for server issues
            ApiErrorCategory::Network => 5,    // Quick retry for network
            _ => 0,                            // No retry
        }
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        self.should_retry()
    }

    fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ApiErrorCategory::Network | ApiErrorCategory::RateLimit => ErrorSeverity::Warning,
            ApiErrorCategory::Onboarding => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        self.should_retry().then(|| Duration::from_secs(self.retry_delay_secs()))
    }
}

/// Convert transport-level domain errors into gateway errors
impl From<NewslineError> for ApiError {
    fn from(err: NewslineError) -> Self {
        match err {
            NewslineError::Network(message) => Self::Network(message),
            NewslineError::Auth(message) => Self::AuthenticationFailed(message),
            NewslineError::Config(message) => Self::Config(message),
            NewslineError::Serialization(message) => Self::Decode(message),
            NewslineError::Storage(message) | NewslineError::Internal(message) => {
                Self::Network(message)
            }
        }
    }
}

impl From<ApiError> for NewslineError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::AuthenticationFailed(message) => Self::Auth(message),
            ApiError::Config(message) => Self::Config(message),
            ApiError::Decode(message) => Self::Serialization(message),
            other => Self::Network(other.to_string()),
        }
    }
}
