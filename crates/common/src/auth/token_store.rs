//! Persistence of session state through a [`KeyValueStore`]
//!
//! Values are JSON encoded: the token record as an object, the family as a
//! JSON string, the used-token history as an array (oldest first).

use std::sync::Arc;

use chrono::Utc;
use newsline_domain::constants::{
    AUTH_TOKENS_KEY, LOGOUT_SIGNAL_KEY, TOKEN_FAMILY_KEY, USED_TOKENS_KEY,
};
use newsline_domain::StoredSession;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::storage::{KeyValueStore, StorageError, StorageResult};

/// Typed view over the session keys of a [`KeyValueStore`]
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn load_session(&self) -> StorageResult<Option<StoredSession>> {
        self.load_json(AUTH_TOKENS_KEY).await
    }

    pub async fn save_session(&self, session: &StoredSession) -> StorageResult<()> {
        self.save_json(AUTH_TOKENS_KEY, session).await
    }

    pub async fn load_family(&self) -> StorageResult<Option<String>> {
        self.load_json(TOKEN_FAMILY_KEY).await
    }

    pub async fn save_family(&self, family: &str) -> StorageResult<()> {
        self.save_json(TOKEN_FAMILY_KEY, &family).await
    }

    pub async fn load_used_tokens(&self) -> StorageResult<Vec<String>> {
        Ok(self.load_json(USED_TOKENS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_used_tokens(&self, ids: &[String]) -> StorageResult<()> {
        self.save_json(USED_TOKENS_KEY, &ids).await
    }

    /// Remove the token record and family; the used-token history survives
    pub async fn clear_session(&self) -> StorageResult<()> {
        self.store.remove(AUTH_TOKENS_KEY).await?;
        self.store.remove(TOKEN_FAMILY_KEY).await
    }

    /// Write then remove the logout marker so store watchers observe a change
    pub async fn signal_logout(&self) -> StorageResult<()> {
        let stamp = Utc::now().timestamp_millis().to_string();
        self.store.set(LOGOUT_SIGNAL_KEY, &stamp).await?;
        self.store.remove(LOGOUT_SIGNAL_KEY).await
    }

    async fn load_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.store.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|err| StorageError::corrupted(key, err)),
            None => Ok(None),
        }
    }

    async fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw).await
    }
}
