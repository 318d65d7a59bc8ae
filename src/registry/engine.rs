//! Subscription registry
//!
//! Tracks which connections currently listen to which topics. Connection
//! lifecycle hooks (the WebSocket transport) call `subscribe`/`unsubscribe`;
//! the broadcast scheduler reads snapshots to pick push targets.
//!
//! Every operation takes the single registry lock, touches one map entry and
//! releases it before returning. Snapshots are owned copies, so callers never
//! hold the lock while doing anything else.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::registry::topic::{ConnectionId, TopicSubscription};

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    topics: Mutex<HashMap<String, TopicSubscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TopicSubscription>> {
        // Map updates never panic midway, so a poisoned lock still holds consistent data.
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes a connection to a topic. Automatically creates the topic entry.
    ///
    /// Subscribing twice counts twice.
    pub fn subscribe(&self, topic: &str, connection_id: &str) {
        let mut topics = self.lock();
        let entry = topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicSubscription::new(topic));
        entry.subscribe(connection_id.to_string());
        debug!(
            topic,
            connection = connection_id,
            subscribers = entry.refcount(),
            "subscription added"
        );
    }

    /// Releases one subscription of `connection_id` to `topic`.
    ///
    /// Unknown topics and connections without a subscription are ignored, so
    /// the count never drops below zero. The topic entry is pruned once its
    /// count reaches zero.
    pub fn unsubscribe(&self, topic: &str, connection_id: &str) {
        let mut topics = self.lock();
        let Some(entry) = topics.get_mut(topic) else {
            debug!(topic, connection = connection_id, "unsubscribe for unknown topic");
            return;
        };

        if !entry.unsubscribe(connection_id) {
            debug!(
                topic,
                connection = connection_id,
                "unsubscribe without a matching subscription"
            );
            return;
        }

        debug!(
            topic,
            connection = connection_id,
            subscribers = entry.refcount(),
            "subscription removed"
        );
        if entry.is_empty() {
            topics.remove(topic);
        }
    }

    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.lock().get(topic).is_some_and(|t| !t.is_empty())
    }

    /// Snapshot of every topic with at least one subscription.
    pub fn topics_with_subscribers(&self) -> HashSet<String> {
        self.lock()
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Snapshot of the distinct connections listening to `topic`.
    pub fn connections_for_topic(&self, topic: &str) -> HashSet<ConnectionId> {
        self.lock()
            .get(topic)
            .map(|t| t.connections().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live subscription events for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().get(topic).map_or(0, TopicSubscription::refcount)
    }
}
