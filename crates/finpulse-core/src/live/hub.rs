//! Live hub using one tokio broadcast channel per user.
//!
//! Sending never blocks. Slow connections miss messages rather than holding up
//! the sender, and users with no open connection have messages dropped.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::traits::{LiveChannel, LiveMessage};

/// Default per-user channel capacity
const DEFAULT_CAPACITY: usize = 64;

/// Fan-out of live messages to every connection a user has open.
#[derive(Clone)]
pub struct LiveHub {
    channels: Arc<DashMap<String, broadcast::Sender<LiveMessage>>>,
    capacity: usize,
}

impl LiveHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// Open a connection for `user_id`. It receives messages sent after this call.
    pub fn subscribe(&self, user_id: &str) -> LiveSubscriber {
        let receiver = self
            .channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        LiveSubscriber {
            user_id: user_id.to_string(),
            receiver,
        }
    }

    /// Open connections for `user_id`.
    pub fn connection_count(&self, user_id: &str) -> usize {
        self.channels
            .get(user_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Users with at least one open connection.
    pub fn connected_users(&self) -> Vec<String> {
        self.channels
            .iter()
            .filter(|entry| entry.value().receiver_count() > 0)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Drop channels whose connections have all closed. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let before = self.channels.len();
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
        before - self.channels.len()
    }
}

impl Default for LiveHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveChannel for LiveHub {
    fn send(&self, user_id: &str, message: LiveMessage) -> usize {
        let Some(sender) = self.channels.get(user_id) else {
            return 0;
        };
        match sender.send(message) {
            Ok(recipients) => recipients,
            Err(_) => {
                drop(sender);
                self.channels
                    .remove_if(user_id, |_, sender| sender.receiver_count() == 0);
                0
            }
        }
    }
}

/// One live connection's view of its user's messages.
pub struct LiveSubscriber {
    user_id: String,
    receiver: broadcast::Receiver<LiveMessage>,
}

impl LiveSubscriber {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Receive the next message.
    ///
    /// Returns None once the hub is gone. Lagged messages are skipped.
    pub async fn recv(&mut self) -> Option<LiveMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(user_id = %self.user_id, "Live connection lagged by {} messages", n);
                    continue;
                }
            }
        }
    }

    /// Try to receive a message without blocking
    pub fn try_recv(&mut self) -> Option<LiveMessage> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(n: u64) -> LiveMessage {
        LiveMessage::new("intervention", serde_json::json!({ "n": n }))
    }

    #[tokio::test]
    async fn test_send_reaches_every_connection_of_the_user() {
        let hub = LiveHub::new();
        let mut tab1 = hub.subscribe("u1");
        let mut tab2 = hub.subscribe("u1");
        let mut other = hub.subscribe("u2");

        assert_eq!(hub.send("u1", message(1)), 2);

        assert_eq!(tab1.recv().await.unwrap().payload["n"], 1);
        assert_eq!(tab2.recv().await.unwrap().payload["n"], 1);
        assert!(other.try_recv().is_none());
    }

    #[test]
    fn test_send_without_connections_is_a_noop() {
        let hub = LiveHub::new();
        assert_eq!(hub.send("nobody", message(1)), 0);

        let sub = hub.subscribe("u1");
        drop(sub);
        assert_eq!(hub.send("u1", message(2)), 0);
        assert!(hub.connected_users().is_empty());
    }

    #[test]
    fn test_connection_tracking_and_prune() {
        let hub = LiveHub::new();
        let _a = hub.subscribe("u1");
        let b = hub.subscribe("u2");
        assert_eq!(hub.connection_count("u1"), 1);

        drop(b);
        assert_eq!(hub.connected_users(), vec!["u1".to_string()]);
        assert_eq!(hub.prune(), 1);
    }

    #[tokio::test]
    async fn test_lagged_connection_keeps_receiving() {
        let hub = LiveHub::with_capacity(2);
        let mut sub = hub.subscribe("u1");
        for n in 0..5 {
            hub.send("u1", message(n));
        }
        assert_eq!(sub.recv().await.unwrap().payload["n"], 3);
        assert_eq!(sub.recv().await.unwrap().payload["n"], 4);
    }
}
