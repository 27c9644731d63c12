//! JWT payload decoding
//!
//! Reads the `exp` and `jti` claims of a token with `jsonwebtoken`. The
//! signature is never verified; the backend is the only party that trusts
//! these values, the client only uses them to schedule refreshes and to
//! identify refresh tokens for replay detection.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while decoding a token payload
#[derive(Debug, Error)]
pub enum TokenDecodeError {
    #[error("Token is not a readable JWT: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Token has no '{0}' claim")]
    MissingClaim(&'static str),

    #[error("Token expiry {0} is out of range")]
    InvalidTimestamp(i64),
}

/// Subset of registered claims the client reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since the Unix epoch
    #[serde(default)]
    pub exp: Option<i64>,
    /// Token id
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
}

fn unverified() -> Validation {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

/// Decode the claims of `token` without checking its signature
pub fn decode_claims(token: &str) -> Result<Claims, TokenDecodeError> {
    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &unverified())?;
    Ok(data.claims)
}

/// Expiry instant of `token`
pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>, TokenDecodeError> {
    let exp = decode_claims(token)?.exp.ok_or(TokenDecodeError::MissingClaim("exp"))?;
    Utc.timestamp_opt(exp, 0).single().ok_or(TokenDecodeError::InvalidTimestamp(exp))
}

/// `jti` claim of `token`, `None` when the token is opaque or has no id
pub fn decode_token_id(token: &str) -> Option<String> {
    decode_claims(token).ok().and_then(|claims| claims.jti).filter(|id| !id.is_empty())
}

/// Source of token expiry and id information
///
/// Injected into the lifecycle manager so tests can control expiry without
/// minting real JWTs.
pub trait TokenDecoder: Send + Sync + fmt::Debug {
    /// Expiry instant of an access token
    fn expiry(&self, token: &str) -> Result<DateTime<Utc>, TokenDecodeError>;

    /// Unique id of a refresh token, if one can be derived
    fn token_id(&self, token: &str) -> Option<String>;
}

/// [`TokenDecoder`] reading standard JWT claims
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtDecoder;

impl TokenDecoder for JwtDecoder {
    fn expiry(&self, token: &str) -> Result<DateTime<Utc>, TokenDecodeError> {
        decode_expiry(token)
    }

    fn token_id(&self, token: &str) -> Option<String> {
        decode_token_id(token)
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    use super::*;

    fn jwt(claims: Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"issuer-secret")).unwrap()
    }

    #[test]
    fn decodes_expiry_and_id() {
        let token = jwt(json!({ "exp": 1_700_000_000, "jti": "rt-1", "sub": "u1" }));

        let expiry = decode_expiry(&token).unwrap();
        assert_eq!(expiry.timestamp(), 1_700_000_000);
        assert_eq!(decode_token_id(&token).as_deref(), Some("rt-1"));
        assert_eq!(JwtDecoder.token_id(&token).as_deref(), Some("rt-1"));
    }

    #[test]
    fn ignores_signature_and_audience() {
        let token = jwt(json!({ "exp": 1, "aud": "newsline-api" }));
        let (unsigned, _) = token.rsplit_once('.').unwrap();
        let forged = format!("{unsigned}.bm90LWEtc2lnbmF0dXJl");

        assert_eq!(decode_expiry(&forged).unwrap().timestamp(), 1);
    }

    #[test]
    fn rejects_opaque_tokens() {
        assert!(matches!(decode_claims("opaque-token"), Err(TokenDecodeError::Jwt(_))));
        assert!(matches!(decode_claims("a.b.c.d"), Err(TokenDecodeError::Jwt(_))));
        assert!(decode_token_id("opaque-token").is_none());
    }

    #[test]
    fn reports_missing_expiry() {
        let no_exp = jwt(json!({ "sub": "u1" }));
        assert!(matches!(decode_expiry(&no_exp), Err(TokenDecodeError::MissingClaim("exp"))));
    }

    #[test]
    fn empty_jti_is_ignored() {
        assert!(decode_token_id(&jwt(json!({ "jti": "" }))).is_none());
    }
}
