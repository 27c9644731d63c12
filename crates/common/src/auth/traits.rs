//! Seams of the session core
//!
//! The lifecycle manager talks to the backend only through
//! [`RefreshClient`], so transports can be swapped and tests can script
//! refresh outcomes.

use async_trait::async_trait;
use newsline_domain::{RefreshRequest, RefreshResponse};
use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};

/// Outcome of a failed refresh call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The backend refused the refresh token (401/403); the session is over
    #[error("Refresh rejected with status {status}")]
    Rejected { status: u16, message: Option<String> },

    /// The call never produced a verdict (connectivity, timeout, 5xx)
    #[error("Refresh failed transiently: {0}")]
    Transient(String),

    /// The backend answered 2xx with a body that is not a token pair
    #[error("Refresh response was invalid: {0}")]
    InvalidResponse(String),
}

impl RefreshError {
    /// Whether the backend refused the token
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

impl ErrorClassification for RefreshError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Rejected { .. } => ErrorSeverity::Warning,
            Self::Transient(_) => ErrorSeverity::Warning,
            Self::InvalidResponse(_) => ErrorSeverity::Error,
        }
    }
}

/// Exchanges a refresh token for a new token pair
#[async_trait]
pub trait RefreshClient: Send + Sync {
    /// Perform one refresh call
    ///
    /// # Errors
    /// - [`RefreshError::Rejected`] when the backend refuses the token
    /// - [`RefreshError::Transient`] when no verdict was obtained
    /// - [`RefreshError::InvalidResponse`] when the success body is unusable
    async fn refresh(&self, request: &RefreshRequest) -> Result<RefreshResponse, RefreshError>;
}
