use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;

use crate::transport::message::ServerMessage;
use crate::utils::{FeedError, Result};

/// Represents one connected WebSocket client.
///
/// Each client is uniquely identified by an `id` and has a channel (`sender`)
/// feeding the task that writes to its socket.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for the socket, `client-<uuid>`.
    pub id: String,

    /// Channel to send WebSocket messages to the client.
    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("client-{}", uuid::Uuid::new_v4()),
            sender,
        }
    }

    /// Serializes `message` as JSON text and queues it for the socket.
    pub fn send(&self, message: &ServerMessage) -> Result<()> {
        let text = serde_json::to_string(message)?;
        self.sender
            .send(WsMessage::text(text))
            .map_err(|e| FeedError::Publish {
                channel: self.id.clone(),
                reason: e.to_string(),
            })
    }
}
