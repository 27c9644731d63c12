//! Domain types and models

pub mod token;
pub mod user;

pub use token::{RefreshRequest, RefreshResponse, RevokeRequest, StoredSession, TokenPair};
pub use user::{Credentials, SignupRequest, UserPreferences, UserProfile};
