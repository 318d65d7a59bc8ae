//! Wire protocol
//!
//! Every frame is a JSON object tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::feed::ContentItem;
use crate::scheduler::PushPayload;

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start streaming pushes for `topic`. `connection_id` lets a client
    /// resume a cursor it used before (for example from another tab).
    Subscribe {
        topic: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection_id: Option<String>,
    },
    Unsubscribe {
        topic: String,
    },
    /// Pull the next page; `count` defaults to the configured page size.
    NextBatch {
        topic: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
    },
    Reset {
        topic: String,
    },
    Topics,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TopicSummary {
    pub name: String,
    pub templates: usize,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome { connection_id: String },
    Topics { topics: Vec<TopicSummary> },
    Subscribed { topic: String, channel: String },
    Unsubscribed { topic: String },
    Batch { topic: String, items: Vec<ContentItem> },
    CursorReset { topic: String },
    Push(PushPayload),
    Error { message: String },
}
