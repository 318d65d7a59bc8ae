//! The `transport` module is responsible for handling network communication
//! with clients via WebSockets.
//!
//! It defines the messaging protocol used between clients and the server,
//! the per-socket session logic, the channel hub the scheduler publishes
//! through, and the WebSocket server itself.

pub mod hub;
pub mod message;
pub mod session;
pub mod websocket;

pub use hub::Hub;
pub use session::{FeedState, Session};
pub use websocket::{serve, start_websocket_server};
