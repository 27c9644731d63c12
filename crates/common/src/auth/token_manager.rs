//! Token lifecycle manager
//!
//! Owns the current access/refresh token pair and everything that happens
//! to it:
//! - persistence of the pair, the token family and the used-token history
//! - a single proactive refresh timer per manager
//! - refresh-token replay detection before every refresh call
//! - coalescing of concurrent refresh attempts
//! - logout fan-out to other instances over a [`SessionChannel`]
//!
//! State lives behind a `parking_lot::Mutex` that is never held across an
//! `.await`; every transition below is a short critical section followed
//! by storage or network I/O.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use newsline_domain::constants::MAX_USED_TOKENS_HISTORY;
use newsline_domain::{RefreshRequest, StoredSession, TokenPair};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::channel::{InstanceSignal, SessionChannel, SignalKind};
use super::events::{ListenerRegistry, SessionEvent, Subscription};
use super::history::UsedTokenHistory;
use super::jwt::{JwtDecoder, TokenDecoder};
use super::schedule::{plan_refresh, RefreshPlan};
use super::token_store::TokenStore;
use super::traits::{RefreshClient, RefreshError};
use crate::storage::KeyValueStore;

type RefreshFuture = Shared<BoxFuture<'static, Option<String>>>;

struct ScheduledRefresh {
    handle: JoinHandle<()>,
    delay: Duration,
    generation: u64,
}

struct InFlightRefresh {
    id: u64,
    future: RefreshFuture,
}

#[derive(Default)]
struct SessionState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    refresh_token_id: Option<String>,
    refresh_token_expiry: Option<i64>,
    token_family: Option<String>,
    history: UsedTokenHistory,
    /// Bumped on every set/clear; refresh results from an older generation
    /// are discarded.
    generation: u64,
    next_flight_id: u64,
    timer: Option<ScheduledRefresh>,
    in_flight: Option<InFlightRefresh>,
}

enum RefreshAttempt {
    Replay(String),
    Proceed { request: RefreshRequest, token_id: Option<String>, generation: u64, used: Vec<String> },
}

/// Builder for [`TokenLifecycleManager`]
pub struct TokenLifecycleManagerBuilder {
    store: Arc<dyn KeyValueStore>,
    refresh_client: Arc<dyn RefreshClient>,
    decoder: Arc<dyn TokenDecoder>,
    channel: Option<SessionChannel>,
    history_capacity: usize,
}

impl TokenLifecycleManagerBuilder {
    /// Replace the default [`JwtDecoder`]
    #[must_use]
    pub fn decoder(mut self, decoder: impl TokenDecoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Join a cross-instance channel
    #[must_use]
    pub fn channel(mut self, channel: SessionChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Override the used-token history capacity (default 10)
    #[must_use]
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Construct the manager without touching storage
    ///
    /// Call [`TokenLifecycleManager::initialize`] before use, or use
    /// [`TokenLifecycleManagerBuilder::start`].
    pub fn build(self) -> Arc<TokenLifecycleManager> {
        let history = UsedTokenHistory::with_capacity(self.history_capacity);
        Arc::new_cyclic(|weak_self| TokenLifecycleManager {
            refresh_client: self.refresh_client,
            token_store: TokenStore::new(self.store),
            decoder: self.decoder,
            events: ListenerRegistry::new(),
            channel: self.channel,
            instance_id: Uuid::new_v4(),
            history_capacity: history.capacity(),
            state: Mutex::new(SessionState { history, ..SessionState::default() }),
            listener: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    /// Construct, load persisted state and join the channel
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(self) -> Arc<TokenLifecycleManager> {
        let manager = self.build();
        manager.initialize().await;
        manager.spawn_channel_listener();
        manager
    }
}

/// Access/refresh token owner with proactive refresh and replay detection
pub struct TokenLifecycleManager {
    refresh_client: Arc<dyn RefreshClient>,
    token_store: TokenStore,
    decoder: Arc<dyn TokenDecoder>,
    events: ListenerRegistry<SessionEvent>,
    channel: Option<SessionChannel>,
    instance_id: Uuid,
    history_capacity: usize,
    state: Mutex<SessionState>,
    listener: Mutex<Option<JoinHandle<()>>>,
    weak_self: Weak<TokenLifecycleManager>,
}

impl fmt::Debug for TokenLifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenLifecycleManager")
            .field("instance_id", &self.instance_id)
            .field("authenticated", &self.is_authenticated())
            .field("scheduled_refresh", &self.has_scheduled_refresh())
            .finish_non_exhaustive()
    }
}

impl TokenLifecycleManager {
    /// Start building a manager over `store` that refreshes through
    /// `refresh_client`
    pub fn builder(
        store: Arc<dyn KeyValueStore>,
        refresh_client: Arc<dyn RefreshClient>,
    ) -> TokenLifecycleManagerBuilder {
        TokenLifecycleManagerBuilder {
            store,
            refresh_client,
            decoder: Arc::new(JwtDecoder),
            channel: None,
            history_capacity: MAX_USED_TOKENS_HISTORY,
        }
    }

    /// Load the persisted history, family and token pair
    ///
    /// Returns `true` when a session was restored. A record holding only a
    /// refresh token is restored by refreshing immediately. Storage errors
    /// are logged and treated as "nothing stored".
    pub async fn initialize(&self) -> bool {
        let used = self.token_store.load_used_tokens().await.unwrap_or_else(|err| {
            warn!(error = %err, "Failed to load used refresh token history");
            Vec::new()
        });
        let family = self.token_store.load_family().await.unwrap_or_else(|err| {
            warn!(error = %err, "Failed to load token family");
            None
        });
        let stored = self.token_store.load_session().await.unwrap_or_else(|err| {
            error!(error = %err, "Failed to load stored session");
            None
        });

        {
            let mut state = self.state.lock();
            state.history = UsedTokenHistory::from_ids(used, self.history_capacity);
            state.token_family = family;
        }

        let Some(stored) = stored else {
            debug!("No stored session");
            return false;
        };

        let refresh_token_id = stored
            .refresh_token_id
            .clone()
            .or_else(|| self.decoder.token_id(&stored.refresh_token));
        let restoring = stored.access_token.is_none();

        {
            let mut state = self.state.lock();
            state.generation += 1;
            state.access_token = stored.access_token;
            state.refresh_token = Some(stored.refresh_token);
            state.refresh_token_id = refresh_token_id;
            state.refresh_token_expiry = stored.refresh_token_expiry;
            if !restoring {
                self.schedule_refresh_locked(&mut state);
            }
        }

        if restoring {
            info!("Stored session has no access token; refreshing");
            return self.refresh_access_token().await.is_some();
        }

        info!("Restored stored session");
        true
    }

    /// Install a new token pair, persist it and re-arm the refresh timer
    pub async fn set_tokens(&self, tokens: TokenPair) {
        let refresh_token_id = tokens
            .refresh_token_id
            .clone()
            .or_else(|| self.decoder.token_id(&tokens.refresh_token));
        let record = StoredSession::from_pair(&tokens, refresh_token_id.clone());

        {
            let mut state = self.state.lock();
            state.generation += 1;
            state.access_token = Some(tokens.access_token);
            state.refresh_token = Some(tokens.refresh_token);
            state.refresh_token_id = refresh_token_id;
            state.refresh_token_expiry = tokens.refresh_token_expiry;
            if let Some(family) = &tokens.token_family {
                state.token_family = Some(family.clone());
            }
            self.schedule_refresh_locked(&mut state);
        }

        if let Err(err) = self.token_store.save_session(&record).await {
            error!(error = %err, "Failed to persist tokens");
        }
        if let Some(family) = tokens.token_family.as_deref() {
            if let Err(err) = self.token_store.save_family(family).await {
                error!(error = %err, "Failed to persist token family");
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.lock().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.lock().refresh_token.clone()
    }

    pub fn refresh_token_id(&self) -> Option<String> {
        self.state.lock().refresh_token_id.clone()
    }

    /// Refresh token expiry as Unix epoch milliseconds, if the backend sent one
    pub fn refresh_token_expiry(&self) -> Option<i64> {
        self.state.lock().refresh_token_expiry
    }

    pub fn token_family(&self) -> Option<String> {
        self.state.lock().token_family.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.lock().access_token.is_some()
    }

    /// Used refresh token ids, oldest first
    pub fn used_token_ids(&self) -> Vec<String> {
        self.state.lock().history.ids()
    }

    pub fn has_scheduled_refresh(&self) -> bool {
        self.state.lock().timer.is_some()
    }

    /// Delay the pending timer was armed with
    pub fn scheduled_refresh_delay(&self) -> Option<Duration> {
        self.state.lock().timer.as_ref().map(|timer| timer.delay)
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Register a session event listener
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Exchange the refresh token for a new pair
    ///
    /// Returns the new access token, or `None` when there is no refresh
    /// token, the token was already used, the backend rejected it, or the
    /// call failed transiently. Concurrent callers share one backend call.
    pub async fn refresh_access_token(&self) -> Option<String> {
        let future = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.refresh_token.is_none() {
                debug!("No refresh token; skipping refresh");
                return None;
            }

            match state.in_flight.as_ref().map(|flight| flight.future.clone()) {
                Some(future) => {
                    debug!("Joining in-flight refresh");
                    future
                }
                None => {
                    let weak = self.weak_self.clone();
                    let id = state.next_flight_id;
                    state.next_flight_id += 1;

                    // Runs detached so it settles even if every caller is
                    // cancelled; holds the manager only while running.
                    let task = tokio::spawn(async move {
                        let manager = weak.upgrade()?;
                        let outcome = manager.perform_refresh().await;
                        manager.finish_flight(id);
                        outcome
                    });
                    let future: RefreshFuture =
                        task.map(|joined| joined.ok().flatten()).boxed().shared();
                    state.in_flight = Some(InFlightRefresh { id, future: future.clone() });
                    future
                }
            }
        };

        future.await
    }

    /// Forget the session locally, in storage and in every other instance
    ///
    /// The used-token history is kept.
    pub async fn clear_tokens(&self) {
        self.clear_local();
        info!("Session tokens cleared");

        if let Err(err) = self.token_store.clear_session().await {
            error!(error = %err, "Failed to remove persisted tokens");
        }
        if let Err(err) = self.token_store.signal_logout().await {
            warn!(error = %err, "Failed to write logout signal");
        }
        self.publish(SignalKind::LoggedOut);
        self.events.emit(&SessionEvent::LoggedOut { remote: false });
    }

    /// Follow the session channel until the manager is dropped
    ///
    /// Idempotent; does nothing without a channel. Called by
    /// [`TokenLifecycleManagerBuilder::start`].
    pub fn spawn_channel_listener(&self) {
        let Some(channel) = &self.channel else {
            return;
        };
        let mut slot = self.listener.lock();
        if slot.is_some() {
            return;
        }

        let mut receiver = channel.subscribe();
        let weak = self.weak_self.clone();
        let own_id = self.instance_id;
        *slot = Some(tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(signal) if signal.origin == own_id => continue,
                    Ok(signal) => {
                        let Some(manager) = weak.upgrade() else { break };
                        manager.apply_remote(signal);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session channel lagged; signals dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    fn apply_remote(&self, signal: InstanceSignal) {
        match signal.kind {
            SignalKind::LoggedOut => {
                self.clear_local();
                info!(origin = %signal.origin, "Logged out by another instance");
                self.events.emit(&SessionEvent::LoggedOut { remote: true });
            }
            SignalKind::UsedTokens(ids) => {
                debug!(origin = %signal.origin, count = ids.len(), "Used token history synced");
                self.state.lock().history = UsedTokenHistory::from_ids(ids, self.history_capacity);
            }
        }
    }

    fn clear_local(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.access_token = None;
        state.refresh_token = None;
        state.refresh_token_id = None;
        state.refresh_token_expiry = None;
        state.token_family = None;
        if let Some(timer) = state.timer.take() {
            timer.handle.abort();
        }
    }

    fn schedule_refresh_locked(&self, state: &mut SessionState) {
        if let Some(previous) = state.timer.take() {
            previous.handle.abort();
        }
        let Some(access_token) = state.access_token.as_deref() else {
            return;
        };

        let plan = match self.decoder.expiry(access_token) {
            Ok(expires_at) => plan_refresh(expires_at - Utc::now()),
            Err(err) => {
                warn!(error = %err, "Access token expiry unreadable; refreshing now");
                RefreshPlan::Immediate
            }
        };
        let delay = plan.delay();
        let generation = state.generation;
        let weak = self.weak_self.clone();

        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let Some(manager) = weak.upgrade() else { return };
            if manager.claim_timer(generation) {
                manager.refresh_access_token().await;
            }
        });

        debug!(delay_ms = delay.as_millis() as u64, "Token refresh scheduled");
        state.timer = Some(ScheduledRefresh { handle, delay, generation });
    }

    /// Empty the timer slot if it still belongs to `generation`
    fn claim_timer(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        let owned = state.timer.as_ref().is_some_and(|timer| timer.generation == generation);
        if owned {
            state.timer = None;
        }
        owned
    }

    fn finish_flight(&self, id: u64) {
        let mut state = self.state.lock();
        if state.in_flight.as_ref().is_some_and(|flight| flight.id == id) {
            state.in_flight = None;
        }
    }

    fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    async fn perform_refresh(&self) -> Option<String> {
        let attempt = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let refresh_token = state.refresh_token.clone()?;

            match state.refresh_token_id.clone() {
                Some(id) if state.history.contains(&id) => RefreshAttempt::Replay(id),
                token_id => {
                    if let Some(id) = &token_id {
                        state.history.record(id.clone());
                    } else {
                        debug!("Refresh token has no id; replay detection unavailable");
                    }
                    RefreshAttempt::Proceed {
                        request: RefreshRequest {
                            refresh_token,
                            token_family: state.token_family.clone(),
                        },
                        used: state.history.ids(),
                        token_id,
                        generation: state.generation,
                    }
                }
            }
        };

        let (request, token_id, generation) = match attempt {
            RefreshAttempt::Replay(id) => {
                error!(refresh_token_id = %id, "Refresh token reuse detected; clearing session");
                self.clear_tokens().await;
                self.events.emit(&SessionEvent::SecurityBreach);
                return None;
            }
            RefreshAttempt::Proceed { request, token_id, generation, used } => {
                if token_id.is_some() {
                    self.persist_used_tokens(used).await;
                }
                (request, token_id, generation)
            }
        };

        match self.refresh_client.refresh(&request).await {
            Ok(response) => {
                if self.generation() != generation {
                    info!("Session changed during refresh; discarding refreshed tokens");
                    return None;
                }
                let access_token = response.tokens.access_token.clone();
                let previous_token_revoked = response.previous_token_revoked;
                self.set_tokens(response.tokens).await;
                info!(?previous_token_revoked, "Access token refreshed");
                self.events.emit(&SessionEvent::TokenRefreshed { previous_token_revoked });
                Some(access_token)
            }
            Err(err @ (RefreshError::Rejected { .. } | RefreshError::InvalidResponse(_))) => {
                // The presented token is spent either way; its id stays recorded.
                warn!(error = %err, "Token refresh failed; clearing session");
                if self.generation() == generation {
                    self.clear_tokens().await;
                    self.events.emit(&SessionEvent::RefreshFailed);
                }
                None
            }
            Err(err @ RefreshError::Transient(_)) => {
                warn!(error = %err, "Token refresh failed transiently; keeping session");
                if let Some(id) = token_id {
                    self.release_reservation(&id).await;
                }
                None
            }
        }
    }

    /// Drop a history entry recorded for a refresh the backend never judged
    async fn release_reservation(&self, id: &str) {
        let used = {
            let mut state = self.state.lock();
            state.history.release(id).then(|| state.history.ids())
        };
        if let Some(used) = used {
            self.persist_used_tokens(used).await;
        }
    }

    async fn persist_used_tokens(&self, used: Vec<String>) {
        if let Err(err) = self.token_store.save_used_tokens(&used).await {
            error!(error = %err, "Failed to persist used refresh token history");
        }
        self.publish(SignalKind::UsedTokens(used));
    }

    fn publish(&self, kind: SignalKind) {
        if let Some(channel) = &self.channel {
            channel.publish(InstanceSignal { origin: self.instance_id, kind });
        }
    }
}

impl Drop for TokenLifecycleManager {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().timer.take() {
            timer.handle.abort();
        }
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::token_manager.
    use std::sync::atomic::{AtomicUsize, Ordering};

    use newsline_domain::constants::{AUTH_TOKENS_KEY, TOKEN_FAMILY_KEY, USED_TOKENS_KEY};
    use newsline_domain::RefreshResponse;

    use super::*;
    use crate::storage::MemoryStore;
    use crate::testing::fixtures::{access_jwt, refresh_jwt};
    use crate::testing::mocks::{FailingStore, MockRefreshClient};

    fn manager(store: MemoryStore, client: MockRefreshClient) -> Arc<TokenLifecycleManager> {
        TokenLifecycleManager::builder(Arc::new(store), Arc::new(client)).build()
    }

    fn pair(access_secs: i64, jti: &str) -> TokenPair {
        TokenPair::new(access_jwt(access_secs), refresh_jwt(jti))
    }

    /// Validates `set_tokens` for the login scenario.
    ///
    /// Assertions:
    /// - Confirms the pair, the derived refresh id and the family are held.
    /// - Confirms the pair and family are persisted.
    /// - Confirms exactly one timer is armed.
    #[tokio::test]
    async fn test_set_tokens_persists_and_schedules() {
        let store = MemoryStore::new();
        let manager = manager(store.clone(), MockRefreshClient::new());

        manager.set_tokens(pair(3600, "rt-1").with_token_family("fam-1")).await;

        assert!(manager.is_authenticated());
        assert_eq!(manager.refresh_token_id().as_deref(), Some("rt-1"));
        assert_eq!(manager.token_family().as_deref(), Some("fam-1"));
        assert!(store.contains(AUTH_TOKENS_KEY));
        assert_eq!(store.peek(TOKEN_FAMILY_KEY).as_deref(), Some("\"fam-1\""));
        assert!(manager.has_scheduled_refresh());
    }

    /// Validates that an explicit refresh id wins over the `jti` claim.
    #[tokio::test]
    async fn test_explicit_refresh_id_preferred() {
        let manager = manager(MemoryStore::new(), MockRefreshClient::new());
        manager.set_tokens(pair(3600, "from-jti").with_refresh_token_id("explicit")).await;
        assert_eq!(manager.refresh_token_id().as_deref(), Some("explicit"));
    }

    /// Validates persistence independence.
    ///
    /// Assertions:
    /// - Ensures a failing store leaves the in-memory pair installed.
    #[tokio::test]
    async fn test_set_tokens_survives_storage_failure() {
        let store = FailingStore::new();
        store.fail_writes(true);
        let manager =
            TokenLifecycleManager::builder(Arc::new(store), Arc::new(MockRefreshClient::new()))
                .build();

        manager.set_tokens(TokenPair::new(access_jwt(600), "r1")).await;

        assert_eq!(manager.refresh_token().as_deref(), Some("r1"));
        assert!(manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_is_noop() {
        let client = MockRefreshClient::new();
        let manager = manager(MemoryStore::new(), client.clone());

        assert!(manager.refresh_access_token().await.is_none());
        assert_eq!(client.call_count(), 0);
    }

    /// Validates the replay guard.
    ///
    /// Assertions:
    /// - Ensures no network call is made for a remembered id.
    /// - Confirms tokens are cleared and `SecurityBreach` is emitted.
    #[tokio::test]
    async fn test_replayed_refresh_token_is_rejected() {
        let store = MemoryStore::new();
        store.set(USED_TOKENS_KEY, r#"["rt-1"]"#).await.unwrap();
        let client = MockRefreshClient::new();
        let manager = manager(store, client.clone());
        manager.initialize().await;

        let breaches = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&breaches);
        manager.subscribe(move |event| {
            if *event == SessionEvent::SecurityBreach {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        manager.set_tokens(pair(3600, "rt-1")).await;
        assert!(manager.refresh_access_token().await.is_none());

        assert_eq!(client.call_count(), 0);
        assert_eq!(breaches.load(Ordering::SeqCst), 1);
        assert!(!manager.is_authenticated());
    }

    /// Validates a successful refresh.
    ///
    /// Assertions:
    /// - Confirms the new access token is returned and installed.
    /// - Confirms the presented id is recorded and persisted.
    /// - Confirms the family travels with the request.
    #[tokio::test]
    async fn test_refresh_rotates_tokens() {
        let store = MemoryStore::new();
        let client = MockRefreshClient::new();
        let next = pair(3600, "rt-2");
        client.push_response(Ok(RefreshResponse { tokens: next.clone(), previous_token_revoked: Some(true) }));
        let manager = manager(store.clone(), client.clone());

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        manager.subscribe(move |event| sink.lock().push(event.clone()));

        manager.set_tokens(pair(3600, "rt-1").with_token_family("fam-1")).await;
        let token = manager.refresh_access_token().await;

        assert_eq!(token.as_deref(), Some(next.access_token.as_str()));
        assert_eq!(manager.refresh_token_id().as_deref(), Some("rt-2"));
        assert_eq!(manager.used_token_ids(), vec!["rt-1"]);
        assert_eq!(store.peek(USED_TOKENS_KEY).as_deref(), Some(r#"["rt-1"]"#));
        assert_eq!(client.requests()[0].token_family.as_deref(), Some("fam-1"));
        assert_eq!(
            *events.lock(),
            vec![SessionEvent::TokenRefreshed { previous_token_revoked: Some(true) }]
        );
    }

    /// Validates a rejected refresh.
    ///
    /// Assertions:
    /// - Confirms tokens and the persisted record are cleared.
    /// - Confirms `LoggedOut` then `RefreshFailed` are emitted.
    /// - Confirms history survives.
    #[tokio::test]
    async fn test_rejected_refresh_clears_session() {
        let store = MemoryStore::new();
        let client = MockRefreshClient::new();
        client.push_response(Err(RefreshError::Rejected { status: 401, message: None }));
        let manager = manager(store.clone(), client);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        manager.subscribe(move |event| sink.lock().push(event.clone()));

        manager.set_tokens(pair(3600, "rt-1")).await;
        assert!(manager.refresh_access_token().await.is_none());

        assert!(!manager.is_authenticated());
        assert!(!store.contains(AUTH_TOKENS_KEY));
        assert_eq!(manager.used_token_ids(), vec!["rt-1"]);
        assert_eq!(
            *events.lock(),
            vec![SessionEvent::LoggedOut { remote: false }, SessionEvent::RefreshFailed]
        );
    }

    /// Validates that a refresh abandoned by its only caller neither keeps
    /// the manager alive nor stays parked in the in-flight slot.
    #[tokio::test(start_paused = true)]
    async fn test_abandoned_refresh_releases_manager() {
        let client = MockRefreshClient::new().with_delay(Duration::from_secs(1));
        let manager = manager(MemoryStore::new(), client.clone());
        manager.set_tokens(pair(3600, "rt-1")).await;

        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), manager.refresh_access_token()).await;
        assert!(abandoned.is_err());
        assert!(manager.state.lock().in_flight.is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(manager.state.lock().in_flight.is_none());
        assert_eq!(client.call_count(), 1);

        let weak = Arc::downgrade(&manager);
        drop(manager);
        assert!(weak.upgrade().is_none());
    }

    /// Validates a transient failure.
    ///
    /// Assertions:
    /// - Confirms the session is kept.
    /// - Confirms the id reservation is released so a later retry is allowed.
    #[tokio::test]
    async fn test_transient_failure_keeps_session() {
        let client = MockRefreshClient::new();
        client.push_response(Err(RefreshError::Transient("connection reset".into())));
        let manager = manager(MemoryStore::new(), client.clone());

        manager.set_tokens(pair(3600, "rt-1")).await;
        assert!(manager.refresh_access_token().await.is_none());

        assert!(manager.is_authenticated());
        assert!(manager.used_token_ids().is_empty());

        // Retry reaches the backend instead of tripping the replay guard.
        assert!(manager.refresh_access_token().await.is_some());
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_response_ends_session() {
        let client = MockRefreshClient::new();
        client.push_response(Err(RefreshError::InvalidResponse("missing access_token".into())));
        let manager = manager(MemoryStore::new(), client);

        manager.set_tokens(pair(3600, "rt-1")).await;
        assert!(manager.refresh_access_token().await.is_none());

        assert!(!manager.is_authenticated());
        assert_eq!(manager.used_token_ids(), vec!["rt-1"]);
    }

    /// Validates `clear_tokens`.
    ///
    /// Assertions:
    /// - Confirms memory and storage are wiped except the history.
    /// - Confirms the timer is cancelled.
    #[tokio::test]
    async fn test_clear_tokens_keeps_history() {
        let store = MemoryStore::new();
        let manager = manager(store.clone(), MockRefreshClient::new());
        manager.set_tokens(pair(3600, "rt-1").with_token_family("fam")).await;
        manager.refresh_access_token().await;

        manager.clear_tokens().await;

        assert!(!manager.is_authenticated());
        assert!(manager.refresh_token().is_none());
        assert!(manager.token_family().is_none());
        assert!(!manager.has_scheduled_refresh());
        assert!(!store.contains(AUTH_TOKENS_KEY));
        assert!(!store.contains(TOKEN_FAMILY_KEY));
        assert!(store.contains(USED_TOKENS_KEY));
        assert_eq!(manager.used_token_ids(), vec!["rt-1"]);
    }

    /// Validates restoring a persisted session.
    #[tokio::test]
    async fn test_initialize_restores_session() {
        let store = MemoryStore::new();
        let first = manager(store.clone(), MockRefreshClient::new());
        first.set_tokens(pair(3600, "rt-1").with_token_family("fam")).await;
        drop(first);

        let second = manager(store, MockRefreshClient::new());
        assert!(second.initialize().await);
        assert!(second.is_authenticated());
        assert_eq!(second.refresh_token_id().as_deref(), Some("rt-1"));
        assert_eq!(second.token_family().as_deref(), Some("fam"));
        assert!(second.has_scheduled_refresh());
    }

    /// Validates restoring from a refresh-only record.
    ///
    /// Assertions:
    /// - Confirms an immediate refresh is attempted during initialisation.
    #[tokio::test]
    async fn test_initialize_refreshes_refresh_only_record() {
        let store = MemoryStore::new();
        store
            .set(AUTH_TOKENS_KEY, &serde_json::json!({ "refresh_token": refresh_jwt("rt-0") }).to_string())
            .await
            .unwrap();
        let client = MockRefreshClient::new();
        let manager = manager(store, client.clone());

        assert!(manager.initialize().await);
        assert_eq!(client.call_count(), 1);
        assert!(manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_initialize_with_corrupted_record() {
        let store = MemoryStore::new();
        store.set(AUTH_TOKENS_KEY, "not json").await.unwrap();
        let manager = manager(store, MockRefreshClient::new());

        assert!(!manager.initialize().await);
        assert!(!manager.is_authenticated());
    }
}
