//! Token pair and persisted session records
//!
//! Wire and storage shapes for the access/refresh token pair issued by the
//! backend. Field names follow the backend's snake_case token payloads; the
//! refresh and revoke request bodies use the backend's camelCase.

use serde::{Deserialize, Serialize};

/// Access and refresh tokens issued together by the backend
///
/// `refresh_token_id` identifies the refresh token for replay detection.
/// When the backend omits it the session core derives it from the refresh
/// token's `jti` claim, if the token is a decodable JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Bearer credential attached to API requests
    pub access_token: String,

    /// Single-use credential exchanged for a new pair
    pub refresh_token: String,

    /// Unique id of the refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_id: Option<String>,

    /// Refresh token expiry as Unix epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_expiry: Option<i64>,

    /// Lineage identifier shared by every refresh token rotated from one login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_family: Option<String>,
}

impl TokenPair {
    /// Create a pair with only the two mandatory tokens
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            refresh_token_id: None,
            refresh_token_expiry: None,
            token_family: None,
        }
    }

    /// Set the explicit refresh token id
    #[must_use]
    pub fn with_refresh_token_id(mut self, id: impl Into<String>) -> Self {
        self.refresh_token_id = Some(id.into());
        self
    }

    /// Set the token family
    #[must_use]
    pub fn with_token_family(mut self, family: impl Into<String>) -> Self {
        self.token_family = Some(family.into());
        self
    }

    /// Set the refresh token expiry (Unix epoch milliseconds)
    #[must_use]
    pub fn with_refresh_token_expiry(mut self, expiry_ms: i64) -> Self {
        self.refresh_token_expiry = Some(expiry_ms);
        self
    }
}

/// Response body of `POST /auth/refresh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,

    /// Whether the backend revoked the refresh token that was presented
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_token_revoked: Option<bool>,
}

/// Session record persisted under the `auth_tokens` key
///
/// `access_token` is optional so that records written by clients that only
/// persisted the refresh credential can still be restored (by refreshing
/// immediately on start).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_expiry: Option<i64>,
}

impl StoredSession {
    /// Build the persisted record for a pair whose refresh id is resolved
    #[must_use]
    pub fn from_pair(pair: &TokenPair, refresh_token_id: Option<String>) -> Self {
        Self {
            access_token: Some(pair.access_token.clone()),
            refresh_token: pair.refresh_token.clone(),
            refresh_token_id,
            refresh_token_expiry: pair.refresh_token_expiry,
        }
    }
}

/// Body of `POST /auth/refresh` when the refresh token travels in the body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub token_family: Option<String>,
}

/// Body of `POST /auth/revoke`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeRequest {
    pub token_family: String,
}
