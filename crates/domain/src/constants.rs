//! Application constants
//!
//! Storage keys, refresh policy constants and backend contract markers used
//! by the session core.

// Durable store keys
pub const AUTH_TOKENS_KEY: &str = "auth_tokens";
pub const TOKEN_FAMILY_KEY: &str = "token_family";
pub const USED_TOKENS_KEY: &str = "used_refresh_tokens";
/// Written then removed immediately; carries no data.
pub const LOGOUT_SIGNAL_KEY: &str = "auth_logout";

// Replay guard
pub const MAX_USED_TOKENS_HISTORY: usize = 10;

// Proactive refresh policy
pub const REFRESH_LIFETIME_FRACTION: f64 = 0.75;
pub const REFRESH_FLOOR_SECS: i64 = 300;

// Backend contract
pub const ONBOARDING_REQUIRED_MARKER: &str = "Onboarding must be completed";
pub const ONBOARDING_REQUIRED_MESSAGE: &str = "Onboarding must be completed first";
pub const SECURITY_BREACH_ALERT: &str =
    "Possible security breach detected. Please log in again for your safety.";

// Endpoints
pub const LOGIN_PATH: &str = "/auth/login";
pub const SIGNUP_PATH: &str = "/auth/signup";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const REVOKE_PATH: &str = "/auth/revoke";
pub const PROFILE_PATH: &str = "/profile";
