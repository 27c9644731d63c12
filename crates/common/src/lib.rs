//! Session core shared by the Newsline client crates.
//!
//! - [`storage`]: durable key-value store contract and an in-memory store
//! - [`auth`]: token lifecycle manager, replay guard, refresh scheduling,
//!   session events and cross-instance signalling
//! - [`error`]: error classification shared by the layers above
//! - [`testing`]: test doubles (enabled by the `test-utils` feature)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod error;
pub mod storage;

#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
pub use auth::{
    RefreshClient, RefreshError, SessionChannel, SessionEvent, Subscription,
    TokenLifecycleManager,
};
pub use error::{ErrorClassification, ErrorSeverity};
pub use storage::{KeyValueStore, MemoryStore, StorageError, StorageResult};
