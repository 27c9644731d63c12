//! Session event fan-out
//!
//! Listeners are plain callbacks invoked synchronously, in registration
//! order, from a snapshot taken outside the registry lock. A listener may
//! therefore subscribe or unsubscribe from inside its own callback.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Lifecycle events emitted by the session core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A refresh succeeded and new tokens are installed
    TokenRefreshed { previous_token_revoked: Option<bool> },
    /// The backend rejected the refresh token; tokens were cleared
    RefreshFailed,
    /// A refresh token was about to be presented twice; tokens were cleared
    SecurityBreach,
    /// Tokens were cleared, locally or by another instance
    LoggedOut { remote: bool },
    /// The backend requires onboarding before serving the request
    OnboardingRequired,
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct RegistryInner<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
}

impl<E: 'static> Detach for Mutex<RegistryInner<E>> {
    fn detach(&self, id: u64) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(listener_id, _)| *listener_id != id);
        inner.listeners.len() != before
    }
}

/// Ordered set of event callbacks
pub struct ListenerRegistry<E> {
    inner: Arc<Mutex<RegistryInner<E>>>,
}

impl<E> Clone for ListenerRegistry<E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<E: 'static> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ListenerRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry").field("listeners", &self.inner.lock().listeners.len()).finish()
    }
}

impl<E: 'static> ListenerRegistry<E> {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(RegistryInner { next_id: 0, listeners: Vec::new() })) }
    }

    /// Register `listener`; the returned handle removes it
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Arc::new(listener)));
            id
        };

        let registry: Weak<dyn Detach> = Arc::downgrade(&self.inner) as Weak<dyn Detach>;
        Subscription { id, registry, active: AtomicBool::new(true) }
    }

    /// Invoke every listener registered at the time of the call
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> =
            self.inner.lock().listeners.iter().map(|(_, listener)| Arc::clone(listener)).collect();

        for listener in snapshot {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by [`ListenerRegistry::subscribe`]
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Detach>,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the listener; returns `true` only on the first effective call
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.registry.upgrade().is_some_and(|registry| registry.detach(self.id))
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).field("active", &self.is_active()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_in_registration_order() {
        let registry = ListenerRegistry::<SessionEvent>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            registry.subscribe(move |event: &SessionEvent| seen.lock().push((tag, event.clone())));
        }

        registry.emit(&SessionEvent::RefreshFailed);
        assert_eq!(
            *seen.lock(),
            vec![("first", SessionEvent::RefreshFailed), ("second", SessionEvent::RefreshFailed)]
        );
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let registry = ListenerRegistry::<SessionEvent>::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        let subscription = registry.subscribe(move |_| *counter.lock() += 1);

        registry.emit(&SessionEvent::SecurityBreach);
        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        registry.emit(&SessionEvent::SecurityBreach);

        assert_eq!(*hits.lock(), 1);
        assert!(registry.is_empty());
        assert!(!subscription.is_active());
    }

    #[test]
    fn dropped_handle_keeps_listener() {
        let registry = ListenerRegistry::<SessionEvent>::new();
        drop(registry.subscribe(|_| {}));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn listener_may_subscribe_during_emit() {
        let registry = ListenerRegistry::<SessionEvent>::new();
        let inner = registry.clone();
        registry.subscribe(move |_| {
            inner.subscribe(|_| {});
        });

        registry.emit(&SessionEvent::OnboardingRequired);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unsubscribe_after_registry_dropped() {
        let registry = ListenerRegistry::<SessionEvent>::new();
        let subscription = registry.subscribe(|_| {});
        drop(registry);
        assert!(!subscription.unsubscribe());
    }
}
