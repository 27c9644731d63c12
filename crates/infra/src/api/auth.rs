//! Account operations: login, signup, logout and profile
//!
//! Built on [`ApiGateway`]; login installs the issued tokens into the
//! gateway's lifecycle manager, logout revokes the token family on a best
//! effort basis before clearing the session.

use std::sync::Arc;

use newsline_domain::constants::{LOGIN_PATH, PROFILE_PATH, REVOKE_PATH, SIGNUP_PATH};
use newsline_domain::{Credentials, RevokeRequest, SignupRequest, TokenPair, UserProfile};
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::errors::ApiError;
use super::gateway::{ApiGateway, ApiResponse, RequestOptions};

/// User-facing login and signup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthApiError {
    #[error("The server is unavailable right now. Please try again in a few moments.")]
    ServerUnavailable,

    #[error("That email or password doesn't seem right. Try again.")]
    InvalidCredentials,

    #[error("Your account is disabled. Please contact support for assistance.")]
    AccountDisabled,

    #[error("We couldn't log you in.")]
    LoginFailed,

    #[error("This email is already registered. Try logging in instead.")]
    AlreadyRegistered,

    #[error("Please check your email and password format and try again.")]
    InvalidSignup,

    #[error("Something went wrong during signup. Please try again.")]
    SignupFailed,
}

impl AuthApiError {
    fn from_login(err: &ApiError) -> Self {
        match err.status() {
            Some(status) if status >= 500 => Self::ServerUnavailable,
            Some(404) => Self::InvalidCredentials,
            Some(403) => Self::AccountDisabled,
            _ => Self::LoginFailed,
        }
    }

    fn from_signup(err: &ApiError) -> Self {
        match err.status() {
            Some(status) if status >= 500 => Self::ServerUnavailable,
            Some(409) => Self::AlreadyRegistered,
            Some(400) => Self::InvalidSignup,
            _ => Self::SignupFailed,
        }
    }
}

/// Account endpoints
#[derive(Debug, Clone)]
pub struct AuthApi {
    gateway: Arc<ApiGateway>,
}

impl AuthApi {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<ApiGateway> {
        &self.gateway
    }

    /// Exchange credentials for tokens, install them, and load the profile
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, AuthApiError> {
        let credentials = Credentials { email: email.to_string(), password: password.to_string() };
        let options = RequestOptions::post(&credentials)
            .map_err(|_| AuthApiError::LoginFailed)?
            .public();

        let tokens: TokenPair = self
            .gateway
            .request(LOGIN_PATH, options)
            .await
            .and_then(ApiResponse::deserialize)
            .map_err(|err| {
                warn!(error = %err, "login failed");
                AuthApiError::from_login(&err)
            })?;

        self.gateway.tokens().set_tokens(tokens).await;
        info!("login succeeded");

        self.fetch_profile().await.map_err(|err| {
            warn!(error = %err, "profile fetch after login failed");
            AuthApiError::LoginFailed
        })
    }

    /// Register a new account; the backend answers with JSON or text
    #[instrument(skip_all)]
    pub async fn signup(&self, email: &str, password: &str, name: &str) -> Result<ApiResponse, AuthApiError> {
        let request = SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        };
        let options = RequestOptions::post(&request)
            .map_err(|_| AuthApiError::SignupFailed)?
            .public();

        self.gateway.request(SIGNUP_PATH, options).await.map_err(|err| {
            warn!(error = %err, "signup failed");
            AuthApiError::from_signup(&err)
        })
    }

    /// Revoke the token family (failures are logged), then clear the session
    #[instrument(skip_all)]
    pub async fn logout(&self) {
        let tokens = self.gateway.tokens();

        if let Some(token_family) = tokens.token_family() {
            let revoke = RevokeRequest { token_family };
            let outcome = match RequestOptions::post(&revoke) {
                Ok(options) => self.gateway.request(REVOKE_PATH, options).await.map(|_| ()),
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                warn!(error = %err, "failed to revoke tokens on server");
            }
        }

        tokens.clear_tokens().await;
        info!("logged out");
    }

    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        self.gateway.get(PROFILE_PATH).await
    }
}
