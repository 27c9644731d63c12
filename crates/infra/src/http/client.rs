use std::time::Duration;

use newsline_domain::NewslineError;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

use super::USER_AGENT;
use crate::errors::InfraError;

/// How many times a backend call may be sent
///
/// A request that never reached the backend (connection refused, DNS) is
/// re-sent for any method. 5xx responses and timeouts are re-sent only for
/// idempotent methods, since a POST may already have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: usize,
    backoff: Duration,
}

impl RetryPolicy {
    /// One attempt, no retries
    pub const fn single() -> Self {
        Self { attempts: 1, backoff: Duration::ZERO }
    }

    /// Up to `attempts` sends, waiting `backoff * n` before the n-th retry
    pub fn new(attempts: usize, backoff: Duration) -> Self {
        Self { attempts: attempts.max(1), backoff }
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    fn delay(&self, retry: usize) -> Duration {
        self.backoff.saturating_mul(u32::try_from(retry).unwrap_or(u32::MAX))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single()
    }
}

/// reqwest client shared by the gateway and the refresh client
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Client sending [`USER_AGENT`] with a per-send `timeout`
    ///
    /// # Errors
    ///
    /// Returns [`NewslineError::Config`] if the TLS backend cannot be set up.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, NewslineError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .no_proxy()
            .build()
            .map_err(|err| NewslineError::from(InfraError::from(err)))?;

        Ok(Self { client, retry })
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Send `builder`, re-sending it as [`RetryPolicy`] allows
    ///
    /// Non-2xx responses are returned as they are; only transport failures
    /// become errors.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, NewslineError> {
        let mut attempt = 1;
        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| NewslineError::Internal("request body is a stream".into()))?
                .build()
                .map_err(|err| NewslineError::from(InfraError::from(err)))?;
            let method = request.method().clone();
            let path = request.url().path().to_string();
            let last = attempt >= self.retry.attempts;

            debug!(attempt, %method, path = %path, "sending backend request");
            match self.client.execute(request).await {
                Ok(response) if last || !(response.status().is_server_error() && is_idempotent(&method)) => {
                    return Ok(response);
                }
                Ok(response) => {
                    debug!(attempt, status = %response.status(), path = %path, "backend error, retrying");
                }
                Err(err) if !last && (err.is_connect() || (err.is_timeout() && is_idempotent(&method))) => {
                    debug!(attempt, error = %err, path = %path, "transport failure, retrying");
                }
                Err(err) => return Err(NewslineError::from(InfraError::from(err))),
            }

            let delay = self.retry.delay(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS)
}
