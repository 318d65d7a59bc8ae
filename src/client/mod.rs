//! The `client` module defines the representation of a connected socket.
//!
//! It provides the `Client` struct, which encapsulates the unique identifier
//! of a single socket and the channel for sending messages to it.

pub mod pubsub_client;
pub use pubsub_client::Client;
