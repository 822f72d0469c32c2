//! Per-user publish/subscribe for live client connections.

mod hub;

pub use hub::{LiveHub, LiveSubscriber};
