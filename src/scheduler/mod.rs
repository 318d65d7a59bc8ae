//! The `scheduler` module runs the background loop that pushes freshly
//! generated items to subscribed connections.

pub mod engine;
pub mod publisher;

pub use engine::{BroadcastScheduler, BroadcastSchedulerBuilder, Tick};
pub use publisher::{ChannelKey, Publisher, PushPayload, Renderer};
