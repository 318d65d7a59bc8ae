//! Outbound seams of the scheduler
//!
//! The scheduler hands every produced item to a `Publisher`, addressed by a
//! `ChannelKey` that names one topic stream of one connection. Delivery is
//! best effort: a publisher reports failure but nobody retries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::feed::ContentItem;
use crate::utils::Result;

/// `topic:<topic>:<connection>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey(String);

impl ChannelKey {
    pub fn new(topic: &str, connection_id: &str) -> Self {
        Self(format!("topic:{topic}:{connection_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a subscriber receives for one pushed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub post: ContentItem,
}

pub trait Publisher: Send + Sync {
    fn publish(&self, channel: &ChannelKey, payload: &PushPayload) -> Result<()>;
}

/// Optional presentation step run before publishing.
pub trait Renderer: Send + Sync {
    fn render(&self, item: &ContentItem) -> Result<String>;
}
