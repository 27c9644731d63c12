//! Token fixtures
//!
//! Tokens are HS256-signed with a throwaway secret; the session core never
//! verifies signatures.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

const REFRESH_LIFETIME_SECS: i64 = 30 * 24 * 3600;
const FIXTURE_SECRET: &[u8] = b"newsline-fixture-secret";

/// Encode `claims` as a signed three-segment JWT
pub fn fake_jwt(claims: &Value) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(FIXTURE_SECRET))
        .expect("HS256 signing of JSON claims")
}

/// Access token expiring `expires_in_secs` from now (negative for expired)
pub fn access_jwt(expires_in_secs: i64) -> String {
    let now = Utc::now().timestamp();
    fake_jwt(&json!({
        "sub": "user-1",
        "iat": now,
        "exp": now + expires_in_secs,
        "nonce": uuid::Uuid::new_v4().to_string(),
    }))
}

/// Refresh token carrying `jti` as its id
pub fn refresh_jwt(jti: &str) -> String {
    let now = Utc::now().timestamp();
    fake_jwt(&json!({
        "sub": "user-1",
        "jti": jti,
        "iat": now,
        "exp": now + REFRESH_LIFETIME_SECS,
    }))
}
