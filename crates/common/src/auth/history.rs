//! Bounded used-refresh-token history
//!
//! Remembers the ids of refresh tokens already presented to the backend.
//! Presenting a remembered id again is treated as replay.

use std::collections::VecDeque;

use newsline_domain::constants::MAX_USED_TOKENS_HISTORY;

/// FIFO set of refresh token ids, oldest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsedTokenHistory {
    ids: VecDeque<String>,
    capacity: usize,
}

impl Default for UsedTokenHistory {
    fn default() -> Self {
        Self::with_capacity(MAX_USED_TOKENS_HISTORY)
    }
}

impl UsedTokenHistory {
    /// Empty history holding at most `capacity` ids (minimum one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { ids: VecDeque::with_capacity(capacity), capacity }
    }

    /// Rebuild a history from persisted ids, keeping the newest `capacity`
    pub fn from_ids<I>(ids: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut history = Self::with_capacity(capacity);
        for id in ids {
            history.record(id);
        }
        history
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|known| known == id)
    }

    /// Remember `id`, evicting the oldest entry when full
    ///
    /// Returns `false` if the id was already present (its position is kept).
    pub fn record(&mut self, id: String) -> bool {
        if self.contains(&id) {
            return false;
        }
        if self.ids.len() == self.capacity {
            self.ids.pop_front();
        }
        self.ids.push_back(id);
        true
    }

    /// Forget `id`; used to hand back a reservation for a refresh that never
    /// reached the backend
    pub fn release(&mut self, id: &str) -> bool {
        match self.ids.iter().position(|known| known == id) {
            Some(index) => self.ids.remove(index).is_some(),
            None => false,
        }
    }

    /// Ids oldest first, in persisted order
    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
