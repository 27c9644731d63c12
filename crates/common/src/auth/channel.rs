//! Cross-instance session signalling
//!
//! Several client instances (windows, tabs, worker processes sharing one
//! runtime) hold a clone of the same [`SessionChannel`]. Each instance tags
//! its signals with its own id and ignores signals carrying that id.

use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 64;

/// What happened in the originating instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    /// The originating instance cleared its tokens
    LoggedOut,
    /// The originating instance updated the used-token history (oldest first)
    UsedTokens(Vec<String>),
}

/// Signal published on the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSignal {
    pub origin: Uuid,
    pub kind: SignalKind,
}

/// Broadcast channel shared by client instances
#[derive(Debug, Clone)]
pub struct SessionChannel {
    sender: broadcast::Sender<InstanceSignal>,
}

impl Default for SessionChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a signal; returns the number of instances that will see it
    pub fn publish(&self, signal: InstanceSignal) -> usize {
        // No subscribers is the normal single-instance case.
        self.sender.send(signal).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InstanceSignal> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
