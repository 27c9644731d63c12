//! Authenticated HTTP request gateway
//!
//! Every backend call made on behalf of a signed-in reader goes through
//! [`ApiGateway::request`]. The gateway attaches the current access token,
//! refreshes it when missing or rejected, retries a rejected request once,
//! and turns backend failures into [`ApiError`] values.
//!
//! Refreshes triggered by concurrent requests are coalesced: the first
//! caller leads, later callers queue behind it and receive the leader's
//! token in arrival order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use newsline_common::auth::{ListenerRegistry, SessionEvent, Subscription, TokenLifecycleManager};
use newsline_domain::constants::ONBOARDING_REQUIRED_MESSAGE;
use newsline_domain::Config;
use parking_lot::Mutex;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use super::errors::ApiError;
use crate::http::{HttpClient, RetryPolicy};

const TRANSPORT_BACKOFF: Duration = Duration::from_millis(200);

/// How a successful response body is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    #[default]
    Json,
    Text,
}

/// Per-request options for [`ApiGateway::request`]
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    /// Extra headers, applied after the default `Content-Type`
    pub headers: Vec<(String, String)>,
    /// Attach the access token (and refresh it when missing)
    pub requires_auth: bool,
    /// Never refresh; set on the single retry after a 401
    pub skip_refresh: bool,
    pub expected_response_type: ResponseType,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: Vec::new(),
            requires_auth: true,
            skip_refresh: false,
            expected_response_type: ResponseType::Json,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn delete() -> Self {
        Self { method: Method::DELETE, ..Self::default() }
    }

    /// POST with a JSON body
    pub fn post<B: Serialize + ?Sized>(body: &B) -> Result<Self, ApiError> {
        Self { method: Method::POST, ..Self::default() }.json(body)
    }

    /// PUT with a JSON body
    pub fn put<B: Serialize + ?Sized>(body: &B) -> Result<Self, ApiError> {
        Self { method: Method::PUT, ..Self::default() }.json(body)
    }

    /// Replace the body with `body` serialized as JSON
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Decode(format!("Failed to serialize body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Send without credentials
    #[must_use]
    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    #[must_use]
    pub fn skip_refresh(mut self) -> Self {
        self.skip_refresh = true;
        self
    }

    /// Read the body as text regardless of its content type
    #[must_use]
    pub fn text(mut self) -> Self {
        self.expected_response_type = ResponseType::Text;
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn for_retry(&self) -> Self {
        Self { skip_refresh: true, ..self.clone() }
    }
}

/// Successful gateway result
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// 204, or any successful DELETE
    Empty,
    Json(Value),
    Text(String),
}

impl ApiResponse {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Collapse into a JSON value; text becomes a JSON string, empty becomes null
    pub fn into_json(self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }

    /// Deserialize the result; an empty result deserializes from `null`
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        serde_json::from_value(self.into_json())
            .map_err(|e| ApiError::Decode(format!("Failed to parse response: {e}")))
    }
}

/// Gateway connection settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub transport_attempts: usize,
    pub onboarding_marker: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for GatewayConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.backend.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.backend.request_timeout_secs),
            transport_attempts: config.backend.transport_attempts,
            onboarding_marker: config.auth.onboarding_marker.clone(),
        }
    }
}

/// Request gateway bound to one token lifecycle manager
pub struct ApiGateway {
    http: HttpClient,
    config: GatewayConfig,
    tokens: Arc<TokenLifecycleManager>,
    coordinator: RefreshCoordinator,
    events: ListenerRegistry<SessionEvent>,
    forwarding: Subscription,
}

impl ApiGateway {
    /// Create a gateway
    ///
    /// Security-breach events raised by `tokens` are forwarded to the
    /// gateway's own breach listeners for as long as the gateway lives.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig, tokens: Arc<TokenLifecycleManager>) -> Result<Self, ApiError> {
        let retry = RetryPolicy::new(config.transport_attempts, TRANSPORT_BACKOFF);
        let http = HttpClient::new(config.timeout, retry)
            .map_err(|e| ApiError::Config(format!("Failed to build HttpClient: {e}")))?;

        let events = ListenerRegistry::new();
        let forward = events.clone();
        let forwarding = tokens.subscribe(move |event: &SessionEvent| {
            if *event == SessionEvent::SecurityBreach {
                forward.emit(event);
            }
        });

        Ok(Self { http, config, tokens, coordinator: RefreshCoordinator::default(), events, forwarding })
    }

    pub fn tokens(&self) -> &Arc<TokenLifecycleManager> {
        &self.tokens
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Register a listener for replay detection
    pub fn on_security_breach<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.events.subscribe(move |event| {
            if *event == SessionEvent::SecurityBreach {
                listener();
            }
        })
    }

    /// Register a listener for the backend's onboarding gate
    pub fn on_onboarding_required<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.events.subscribe(move |event| {
            if *event == SessionEvent::OnboardingRequired {
                listener();
            }
        })
    }

    /// Issue a request to `endpoint` (a path appended to the base URL)
    ///
    /// # Errors
    ///
    /// - [`ApiError::AuthenticationFailed`] when the token cannot be
    ///   refreshed or the retried request is rejected again
    /// - [`ApiError::OnboardingRequired`] for a 403 carrying the onboarding
    ///   marker
    /// - [`ApiError::Status`] for any other non-2xx status
    /// - [`ApiError::Network`] / [`ApiError::Timeout`] for transport failures
    #[instrument(skip(self, options), fields(endpoint = %endpoint, method = %options.method))]
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<ApiResponse, ApiError> {
        let token = self.resolve_token(&options).await;
        let response = self.send(endpoint, &options, token.as_deref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED && options.requires_auth && !options.skip_refresh {
            debug!("access token rejected; refreshing before a single retry");
            let Some(fresh) = self.coordinator.refresh(&self.tokens, token.as_deref()).await else {
                warn!("refresh after 401 produced no token");
                return Err(ApiError::AuthenticationFailed("Authentication failed".to_string()));
            };

            let retry = options.for_retry();
            let response = self.send(endpoint, &retry, Some(&fresh)).await?;
            return self.interpret(endpoint, &retry, response).await;
        }

        self.interpret(endpoint, &options, response).await
    }

    /// GET `endpoint` and deserialize the result
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request(endpoint, RequestOptions::get()).await?.deserialize()
    }

    /// POST `body` as JSON and deserialize the result
    pub async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(endpoint, RequestOptions::post(body)?).await?.deserialize()
    }

    /// PUT `body` as JSON and deserialize the result
    pub async fn put<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(endpoint, RequestOptions::put(body)?).await?.deserialize()
    }

    /// DELETE `endpoint`; the result is always empty
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request(endpoint, RequestOptions::delete()).await?.deserialize()
    }

    async fn resolve_token(&self, options: &RequestOptions) -> Option<String> {
        if !options.requires_auth {
            return None;
        }
        match self.tokens.access_token() {
            Some(token) => Some(token),
            None if !options.skip_refresh => {
                debug!("no access token; refreshing before the request");
                self.coordinator.refresh(&self.tokens, None).await
            }
            None => None,
        }
    }

    async fn send(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.config.base_url, endpoint);

        let mut builder = self
            .http
            .request(options.method.clone(), &url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let timeout = self.config.timeout;
        match tokio::time::timeout(timeout, self.http.send(builder)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(ApiError::from(err)),
            Err(_) => Err(ApiError::Timeout(timeout)),
        }
    }

    async fn interpret(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        response: Response,
    ) -> Result<ApiResponse, ApiError> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);
        let is_json = content_type.as_deref().is_some_and(|ct| ct.contains("application/json"));

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(endpoint, status, is_json, body, options));
        }

        if status == StatusCode::NO_CONTENT || options.method == Method::DELETE {
            return Ok(ApiResponse::Empty);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("Failed to read response body: {e}")))?;

        let as_text = options.expected_response_type == ResponseType::Text
            || (content_type.is_some() && !is_json);
        if as_text {
            return Ok(ApiResponse::Text(body));
        }
        if body.trim().is_empty() {
            return Ok(ApiResponse::Empty);
        }

        serde_json::from_str(&body)
            .map(ApiResponse::Json)
            .map_err(|e| ApiError::Decode(format!("Failed to parse response: {e}")))
    }

    fn classify_failure(
        &self,
        endpoint: &str,
        status: StatusCode,
        is_json: bool,
        body: String,
        options: &RequestOptions,
    ) -> ApiError {
        let message = extract_message(&body, is_json);

        if status == StatusCode::FORBIDDEN {
            if mentions_marker(&body, is_json, &self.config.onboarding_marker) {
                info!(%status, "backend requires onboarding");
                self.events.emit(&SessionEvent::OnboardingRequired);
                return ApiError::OnboardingRequired(ONBOARDING_REQUIRED_MESSAGE.to_string());
            }
        }

        if status == StatusCode::UNAUTHORIZED && options.requires_auth {
            warn!(%status, "request rejected after refresh");
            return ApiError::AuthenticationFailed(
                message.unwrap_or_else(|| "Authentication failed".to_string()),
            );
        }

        debug!(%status, "request failed");
        let message = message.unwrap_or_else(|| {
            format!("Request to {endpoint} failed with status {}", status.as_u16())
        });
        ApiError::Status {
            status: status.as_u16(),
            message,
            body: (!body.is_empty()).then_some(body),
        }
    }
}

impl Drop for ApiGateway {
    fn drop(&mut self) {
        self.forwarding.unsubscribe();
    }
}

impl std::fmt::Debug for ApiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiGateway").field("config", &self.config).finish_non_exhaustive()
    }
}

/// Whether an error body carries `marker`
///
/// JSON bodies are matched on their `message` and `error` string fields;
/// anything else, including unparseable JSON, on the raw text.
fn mentions_marker(body: &str, is_json: bool, marker: &str) -> bool {
    match serde_json::from_str::<Value>(body) {
        Ok(value) if is_json => ["message", "error"]
            .iter()
            .filter_map(|field| value.get(field).and_then(Value::as_str))
            .any(|text| text.contains(marker)),
        _ => body.contains(marker),
    }
}

/// Pull a human-readable message out of an error body
///
/// JSON bodies contribute their `message` or `error` string field; other
/// bodies are used verbatim when non-empty.
fn extract_message(body: &str, is_json: bool) -> Option<String> {
    if is_json {
        let value: Value = serde_json::from_str(body).ok()?;
        ["message", "error"]
            .iter()
            .find_map(|field| value.get(field).and_then(Value::as_str))
            .filter(|message| !message.is_empty())
            .map(str::to_string)
    } else {
        let trimmed = body.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Single-flight refresh with a FIFO queue of waiters
#[derive(Default)]
struct RefreshCoordinator {
    state: Mutex<CoordinatorState>,
}

#[derive(Default)]
struct CoordinatorState {
    in_progress: bool,
    waiters: VecDeque<oneshot::Sender<Option<String>>>,
}

impl RefreshCoordinator {
    /// Obtain a fresh access token
    ///
    /// `rejected` is the token the caller just had refused. If another
    /// caller already replaced it, the current token is returned without a
    /// new refresh.
    async fn refresh(&self, tokens: &TokenLifecycleManager, rejected: Option<&str>) -> Option<String> {
        let waiter = {
            let mut state = self.state.lock();
            if state.in_progress {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Some(rx)
            } else {
                if let Some(current) = tokens.access_token() {
                    if Some(current.as_str()) != rejected {
                        return Some(current);
                    }
                }
                state.in_progress = true;
                None
            }
        };

        if let Some(rx) = waiter {
            return match rx.await {
                Ok(token) => token,
                // Leader was cancelled before settling
                Err(_) => tokens.refresh_access_token().await,
            };
        }

        let leader = LeaderGuard { coordinator: self, settled: false };
        let token = tokens.refresh_access_token().await;
        leader.settle(token.clone());
        token
    }

    fn release(&self, token: Option<Option<String>>) {
        let waiters = {
            let mut state = self.state.lock();
            state.in_progress = false;
            std::mem::take(&mut state.waiters)
        };

        if let Some(token) = token {
            for waiter in waiters {
                let _ = waiter.send(token.clone());
            }
        }
    }
}

struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(mut self, token: Option<String>) {
        self.settled = true;
        self.coordinator.release(Some(token));
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.release(None);
        }
    }
}
