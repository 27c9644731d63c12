//! Storage error types
//!
//! Errors raised by [`KeyValueStore`](super::KeyValueStore) implementations.
//! The session core never propagates these to callers; it logs them and
//! keeps the in-memory state authoritative.

use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupted value under key '{key}': {message}")]
    Corrupted { key: String, message: String },

    #[error("Storage operation timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Build a [`StorageError::Corrupted`] for a value that failed to parse
    pub fn corrupted(key: impl Into<String>, message: impl ToString) -> Self {
        Self::Corrupted { key: key.into(), message: message.to_string() }
    }
}

impl ErrorClassification for StorageError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_) | Self::Io(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Unavailable(_) | Self::Io(_) => ErrorSeverity::Error,
            Self::Corrupted { .. } | Self::SerdeJson(_) => ErrorSeverity::Error,
        }
    }
}

impl From<StorageError> for newsline_domain::NewslineError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}
