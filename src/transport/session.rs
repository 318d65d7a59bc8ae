//! Per-socket protocol state
//!
//! A `Session` turns client frames into registry, cursor and hub calls and
//! remembers every subscription it made so they can be released when the
//! socket goes away.

use std::sync::Arc;

use tracing::{debug, info};

use crate::client::Client;
use crate::feed::CursorService;
use crate::registry::SubscriptionRegistry;
use crate::scheduler::ChannelKey;
use crate::transport::hub::Hub;
use crate::transport::message::{ClientMessage, ServerMessage, TopicSummary};

/// Upper bound on a single `next_batch` request.
pub const MAX_BATCH: usize = 50;

/// Shared services handed to every socket.
#[derive(Debug, Clone)]
pub struct FeedState {
    pub registry: Arc<SubscriptionRegistry>,
    pub feed: Arc<CursorService>,
    pub hub: Arc<Hub>,
    pub page_size: usize,
}

#[derive(Debug)]
pub struct Session {
    client: Client,
    connection_id: String,
    /// One entry per subscribe event: `(topic, connection id used)`.
    subscriptions: Vec<(String, String)>,
}

impl Session {
    /// The socket's own id is its connection id until a client supplies one.
    pub fn new(client: Client) -> Self {
        let connection_id = client.id.clone();
        Self {
            client,
            connection_id,
            subscriptions: Vec::new(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn handle(&mut self, state: &FeedState, message: ClientMessage) -> ServerMessage {
        match message {
            ClientMessage::Subscribe {
                topic,
                connection_id,
            } => self.subscribe(state, topic, connection_id),
            ClientMessage::Unsubscribe { topic } => self.unsubscribe(state, topic),
            ClientMessage::NextBatch { topic, count } => {
                let count = count.unwrap_or(state.page_size).min(MAX_BATCH);
                let items = state.feed.next_batch(&self.connection_id, &topic, count);
                debug!(
                    topic = %topic,
                    connection = %self.connection_id,
                    count = items.len(),
                    "served batch"
                );
                ServerMessage::Batch { topic, items }
            }
            ClientMessage::Reset { topic } => {
                state.feed.reset_cursor(&self.connection_id, &topic);
                ServerMessage::CursorReset { topic }
            }
            ClientMessage::Topics => ServerMessage::Topics {
                topics: state
                    .feed
                    .topics()
                    .into_iter()
                    .map(|name| TopicSummary {
                        templates: state.feed.count_templates(&name),
                        name,
                    })
                    .collect(),
            },
        }
    }

    fn subscribe(
        &mut self,
        state: &FeedState,
        topic: String,
        connection_id: Option<String>,
    ) -> ServerMessage {
        if let Some(id) = connection_id.filter(|id| !id.trim().is_empty()) {
            self.connection_id = id;
        }

        let channel = ChannelKey::new(&topic, &self.connection_id);
        state.registry.subscribe(&topic, &self.connection_id);
        state.hub.stream_from(channel.clone(), &self.client);
        self.subscriptions
            .push((topic.clone(), self.connection_id.clone()));

        info!(
            client = %self.client.id,
            connection = %self.connection_id,
            channel = %channel,
            "subscribed"
        );
        ServerMessage::Subscribed {
            topic,
            channel: channel.to_string(),
        }
    }

    fn unsubscribe(&mut self, state: &FeedState, topic: String) -> ServerMessage {
        let Some(position) = self.subscriptions.iter().rposition(|(t, _)| *t == topic) else {
            return ServerMessage::Error {
                message: format!("not subscribed to {topic}"),
            };
        };

        let (topic, connection_id) = self.subscriptions.remove(position);
        state.registry.unsubscribe(&topic, &connection_id);
        self.release_stream(state, &topic, &connection_id);

        info!(client = %self.client.id, connection = %connection_id, topic = %topic, "unsubscribed");
        ServerMessage::Unsubscribed { topic }
    }

    fn release_stream(&self, state: &FeedState, topic: &str, connection_id: &str) {
        let still_used = self
            .subscriptions
            .iter()
            .any(|(t, c)| t == topic && c == connection_id);
        if !still_used {
            state
                .hub
                .stop_stream(&ChannelKey::new(topic, connection_id), &self.client.id);
        }
    }

    /// Releases every subscription this socket made.
    ///
    /// Cursors are dropped only for the socket's own id; a client-supplied
    /// connection id keeps its cursor for the next socket that adopts it.
    pub fn close(mut self, state: &FeedState) {
        for (topic, connection_id) in self.subscriptions.drain(..) {
            state.registry.unsubscribe(&topic, &connection_id);
        }
        state.hub.stop_all(&self.client.id);
        state.feed.forget_connection(&self.client.id);
        info!(client = %self.client.id, "session closed");
    }
}
