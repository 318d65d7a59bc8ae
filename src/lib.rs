//! # PopFeed
//!
//! `popfeed` serves per-connection content feeds over WebSockets and
//! simulates real-time activity by pushing freshly generated items to the
//! connections subscribed to a topic.
//!
//! ## Core Modules
//!
//! - `catalog`: The immutable template catalog every feed is derived from.
//! - `feed`: Per-connection cursors that walk the templates, then generate unseen items.
//! - `registry`: Tracks which connections subscribe to which topics.
//! - `scheduler`: The background loop that pushes new items to subscribers.
//! - `transport`: The WebSocket server, its protocol and the channel hub.
//! - `client`: Represents a connected WebSocket client.
//! - `config`: Handles loading and managing server configuration.
//! - `utils`: Shared utilities, such as error handling and logging.

pub mod catalog;
pub mod client;
pub mod config;
pub mod feed;
pub mod registry;
pub mod scheduler;
pub mod transport;
pub mod utils;
