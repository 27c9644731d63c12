//! `POST /auth/refresh` over HTTP
//!
//! The refresh token is single-use, so the client never retries at the
//! transport level: a retried request could present a token the backend
//! has already rotated.

use std::time::Duration;

use async_trait::async_trait;
use newsline_common::auth::{RefreshClient, RefreshError};
use newsline_domain::{Config, RefreshBinding, RefreshRequest, RefreshResponse};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::errors::ApiError;
use crate::http::{HttpClient, RetryPolicy};

/// [`RefreshClient`] backed by the backend's refresh endpoint
#[derive(Debug, Clone)]
pub struct HttpRefreshClient {
    http: HttpClient,
    url: String,
    binding: RefreshBinding,
    timeout: Duration,
}

impl HttpRefreshClient {
    /// Build from the backend and auth sections of `config`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let base_url = config.backend.base_url.trim_end_matches('/');
        Self::with_binding(
            format!("{base_url}{}", config.auth.refresh_path),
            config.auth.refresh_binding,
            Duration::from_secs(config.backend.request_timeout_secs),
        )
    }

    pub fn with_binding(
        url: impl Into<String>,
        binding: RefreshBinding,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = HttpClient::new(timeout, RetryPolicy::single())
            .map_err(|e| ApiError::Config(format!("Failed to build HttpClient: {e}")))?;

        Ok(Self { http, url: url.into(), binding, timeout })
    }

    pub fn binding(&self) -> RefreshBinding {
        self.binding
    }
}

#[async_trait]
impl RefreshClient for HttpRefreshClient {
    #[instrument(skip_all, fields(binding = ?self.binding))]
    async fn refresh(&self, request: &RefreshRequest) -> Result<RefreshResponse, RefreshError> {
        let builder = self.http.request(Method::POST, &self.url);
        let builder = match self.binding {
            RefreshBinding::Body => builder.json(request),
            RefreshBinding::Bearer => builder.bearer_auth(&request.refresh_token),
        };

        let response = match tokio::time::timeout(self.timeout, self.http.send(builder)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!(error = %err, "refresh request failed in transit");
                return Err(RefreshError::Transient(err.to_string()));
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "refresh request timed out");
                return Err(RefreshError::Transient(format!(
                    "refresh timed out after {:?}",
                    self.timeout
                )));
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RefreshError::Transient(format!("Failed to read refresh response: {e}")))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!(%status, "refresh token rejected");
            return Err(RefreshError::Rejected { status: status.as_u16(), message: rejection_message(&body) });
        }

        if !status.is_success() {
            debug!(%status, "refresh endpoint failed");
            return Err(RefreshError::Transient(format!("refresh failed with status {}", status.as_u16())));
        }

        serde_json::from_str(&body)
            .map_err(|e| RefreshError::InvalidResponse(format!("Failed to parse refresh response: {e}")))
    }
}

fn rejection_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|field| value.get(field).and_then(Value::as_str))
        .map(str::to_string)
}
