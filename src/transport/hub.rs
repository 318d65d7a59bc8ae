//! Channel hub
//!
//! Maps channel keys to the sockets streaming them and implements the
//! scheduler's `Publisher` on top of it. Several sockets may stream the same
//! channel (two tabs sharing a connection id); each gets a copy.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use tungstenite::protocol::Message as WsMessage;

use crate::client::Client;
use crate::scheduler::{ChannelKey, Publisher, PushPayload};
use crate::transport::message::ServerMessage;
use crate::utils::{FeedError, Result};

type Streams = HashMap<ChannelKey, HashMap<String, UnboundedSender<WsMessage>>>;

#[derive(Debug, Default)]
pub struct Hub {
    streams: Mutex<Streams>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Streams> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Routes pushes on `channel` to `client`.
    pub fn stream_from(&self, channel: ChannelKey, client: &Client) {
        debug!(channel = %channel, client = %client.id, "streaming channel");
        self.lock()
            .entry(channel)
            .or_default()
            .insert(client.id.clone(), client.sender.clone());
    }

    pub fn stop_stream(&self, channel: &ChannelKey, client_id: &str) {
        let mut streams = self.lock();
        if let Some(clients) = streams.get_mut(channel) {
            clients.remove(client_id);
            if clients.is_empty() {
                streams.remove(channel);
            }
        }
    }

    /// Drops every stream owned by `client_id`.
    pub fn stop_all(&self, client_id: &str) {
        let mut streams = self.lock();
        streams.retain(|_, clients| {
            clients.remove(client_id);
            !clients.is_empty()
        });
    }

    pub fn stream_count(&self, channel: &ChannelKey) -> usize {
        self.lock().get(channel).map_or(0, HashMap::len)
    }
}

impl Publisher for Hub {
    fn publish(&self, channel: &ChannelKey, payload: &PushPayload) -> Result<()> {
        let text = serde_json::to_string(&ServerMessage::Push(payload.clone()))?;
        let frame = WsMessage::text(text);

        let mut streams = self.lock();
        let Some(clients) = streams.get_mut(channel) else {
            return Err(FeedError::Publish {
                channel: channel.to_string(),
                reason: "no live stream".to_string(),
            });
        };

        clients.retain(|client_id, sender| match sender.send(frame.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!(channel = %channel, client = %client_id, "dropping closed stream");
                false
            }
        });

        if clients.is_empty() {
            streams.remove(channel);
            return Err(FeedError::Publish {
                channel: channel.to_string(),
                reason: "every stream is closed".to_string(),
            });
        }
        Ok(())
    }
}
