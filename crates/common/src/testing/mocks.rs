//! Mock implementations of the session core's seams

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use newsline_domain::{RefreshRequest, RefreshResponse, TokenPair};
use parking_lot::Mutex;

use super::fixtures::{access_jwt, refresh_jwt};
use crate::auth::{RefreshClient, RefreshError};
use crate::storage::{KeyValueStore, MemoryStore, StorageError, StorageResult};

type ScriptedResponses = Arc<Mutex<VecDeque<Result<RefreshResponse, RefreshError>>>>;

/// Scripted [`RefreshClient`]
///
/// Scripted outcomes are consumed in order; once exhausted every call
/// succeeds with a fresh one-hour access token and a refresh token whose
/// `jti` is `mock-rt-<n>`. Clones share the script and the request log.
///
/// # Examples
///
/// ```
/// use newsline_common::testing::MockRefreshClient;
/// use newsline_common::RefreshError;
///
/// let client = MockRefreshClient::new();
/// client.push_response(Err(RefreshError::Transient("offline".into())));
/// assert_eq!(client.call_count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockRefreshClient {
    responses: ScriptedResponses,
    requests: Arc<Mutex<Vec<RefreshRequest>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    issued: Arc<AtomicUsize>,
}

impl MockRefreshClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call for `delay` before answering
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    /// Queue the outcome of a future call
    pub fn push_response(&self, response: Result<RefreshResponse, RefreshError>) {
        self.responses.lock().push_back(response);
    }

    /// Queue a successful rotation to `tokens`
    pub fn push_tokens(&self, tokens: TokenPair) {
        self.push_response(Ok(RefreshResponse { tokens, previous_token_revoked: Some(true) }));
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<RefreshRequest> {
        self.requests.lock().clone()
    }

    fn next_default(&self) -> RefreshResponse {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        RefreshResponse {
            tokens: TokenPair::new(access_jwt(3600), refresh_jwt(&format!("mock-rt-{n}"))),
            previous_token_revoked: Some(true),
        }
    }
}

#[async_trait]
impl RefreshClient for MockRefreshClient {
    async fn refresh(&self, request: &RefreshRequest) -> Result<RefreshResponse, RefreshError> {
        self.requests.lock().push(request.clone());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.responses.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(self.next_default()))
    }
}

/// [`MemoryStore`] wrapper whose reads and writes can be made to fail
#[derive(Debug, Clone, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fail `set` and `remove`
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The backing store, unaffected by failure flags
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("simulated {op} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.check(&self.fail_reads, "read")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check(&self.fail_writes, "write")?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.check(&self.fail_writes, "write")?;
        self.inner.remove(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_then_default_responses() {
        let client = MockRefreshClient::new();
        client.push_response(Err(RefreshError::Rejected { status: 401, message: None }));
        let request = RefreshRequest { refresh_token: "r".into(), token_family: None };

        assert!(client.refresh(&request).await.is_err());
        let first = client.refresh(&request).await.unwrap();
        let second = client.refresh(&request).await.unwrap();

        assert_ne!(first.tokens.refresh_token, second.tokens.refresh_token);
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn failing_store_toggles() {
        let store = FailingStore::new();
        store.fail_writes(true);
        assert!(store.set("k", "v").await.is_err());

        store.fail_writes(false);
        store.set("k", "v").await.unwrap();
        store.fail_reads(true);
        assert!(store.get("k").await.is_err());
        assert_eq!(store.inner().peek("k").as_deref(), Some("v"));
    }
}
