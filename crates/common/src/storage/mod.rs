//! Durable key-value storage
//!
//! The session core persists a handful of string values (the token record,
//! the token family, the used-token history) through the [`KeyValueStore`]
//! contract. Implementations must be shared by every client instance
//! pointing at the same location so that history and logout signals are
//! visible across instances.

pub mod error;
pub mod memory;

use async_trait::async_trait;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;

/// Asynchronous string key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, `None` when absent
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> StorageResult<()>;
}
