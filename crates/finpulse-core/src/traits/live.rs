//! Live-connection fan-out contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message pushed to a user's live connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMessage {
    /// Event name, e.g. `"intervention"`.
    pub event: String,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}

impl LiveMessage {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload,
            sent_at: Utc::now(),
        }
    }
}

/// Transport-agnostic push channel keyed by user identity.
///
/// Best-effort: with no live connection the message is dropped silently.
pub trait LiveChannel: Send + Sync {
    /// Send to every live connection of `user_id`. Returns the number of recipients.
    fn send(&self, user_id: &str, message: LiveMessage) -> usize;
}
