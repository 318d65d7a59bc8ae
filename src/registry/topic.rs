//! Per-topic subscription state
//!
//! A `TopicSubscription` counts subscription events (`refcount`) and remembers
//! how many of those events each connection is responsible for. A connection
//! stays listed until its own count drops to zero, so two tabs sharing one
//! connection id do not evict each other.
//!
//! Concurrency note: callers must synchronize access (the registry lock).

use std::collections::HashMap;

pub type ConnectionId = String;

#[derive(Debug, Default)]
pub struct TopicSubscription {
    pub name: String,
    refcount: usize,
    listeners: HashMap<ConnectionId, usize>,
}

impl TopicSubscription {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            refcount: 0,
            listeners: HashMap::new(),
        }
    }

    /// Records one more subscription event for `id`.
    pub fn subscribe(&mut self, id: ConnectionId) {
        *self.listeners.entry(id).or_insert(0) += 1;
        self.refcount += 1;
    }

    /// Releases one subscription event held by `id`.
    ///
    /// Returns `false` when `id` holds nothing on this topic; nothing changes then.
    pub fn unsubscribe(&mut self, id: &str) -> bool {
        let Some(count) = self.listeners.get_mut(id) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.listeners.remove(id);
        }
        self.refcount = self.refcount.saturating_sub(1);
        true
    }

    pub fn refcount(&self) -> usize {
        self.refcount
    }

    pub fn is_empty(&self) -> bool {
        self.refcount == 0
    }

    pub fn connections(&self) -> impl Iterator<Item = &ConnectionId> {
        self.listeners.keys()
    }

    pub fn subscriptions_held_by(&self, id: &str) -> usize {
        self.listeners.get(id).copied().unwrap_or(0)
    }
}
