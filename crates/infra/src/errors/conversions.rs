//! Conversions from external infrastructure errors into domain errors.

use newsline_domain::NewslineError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub NewslineError);

impl From<InfraError> for NewslineError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<NewslineError> for InfraError {
    fn from(value: NewslineError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoNewslineError {
    fn into_newsline(self) -> NewslineError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → NewslineError */
/* -------------------------------------------------------------------------- */

impl IntoNewslineError for HttpError {
    fn into_newsline(self) -> NewslineError {
        if self.is_timeout() {
            return NewslineError::Network("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return NewslineError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return NewslineError::Config(format!("invalid HTTP request: {self}"));
        }

        if self.is_decode() {
            return NewslineError::Serialization(format!("invalid HTTP response body: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => NewslineError::Auth(message),
                _ => NewslineError::Network(message),
            };
        }

        NewslineError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_newsline())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → NewslineError */
/* -------------------------------------------------------------------------- */

impl IntoNewslineError for std::io::Error {
    fn into_newsline(self) -> NewslineError {
        use std::io::ErrorKind;

        match self.kind() {
            ErrorKind::PermissionDenied => {
                NewslineError::Storage(format!("permission denied: {self}"))
            }
            ErrorKind::NotFound => NewslineError::Storage(format!("path not found: {self}")),
            _ => NewslineError::Storage(self.to_string()),
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(value.into_newsline())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
