//! The `registry` module tracks topic subscriptions per connection.

pub mod engine;
pub mod topic;

pub use engine::SubscriptionRegistry;
pub use topic::ConnectionId;
