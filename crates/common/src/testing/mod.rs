//! Testing utilities and helpers
//!
//! - **[`fixtures`]**: unsigned JWT builders with controllable `exp`/`jti`
//! - **[`mocks`]**: scripted [`RefreshClient`](crate::auth::RefreshClient)
//!   and a [`KeyValueStore`](crate::storage::KeyValueStore) that fails on
//!   demand
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use newsline_common::testing::{access_jwt, refresh_jwt, MockRefreshClient};
//! use newsline_common::{MemoryStore, TokenLifecycleManager};
//! use newsline_domain::TokenPair;
//!
//! # async fn demo() {
//! let manager = TokenLifecycleManager::builder(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MockRefreshClient::new()),
//! )
//! .start()
//! .await;
//! manager.set_tokens(TokenPair::new(access_jwt(3600), refresh_jwt("rt-1"))).await;
//! assert!(manager.is_authenticated());
//! # }
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::{access_jwt, fake_jwt, refresh_jwt};
pub use mocks::{FailingStore, MockRefreshClient};
