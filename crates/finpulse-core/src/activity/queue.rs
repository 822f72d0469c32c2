//! Unbounded FIFO of activity events awaiting the drain loop.
//!
//! Enqueueing never blocks or rejects. Events are held in process memory only
//! and are lost on restart.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, Mutex};
use tracing::error;

use crate::types::ActivityEvent;

pub struct ActivityQueue {
    sender: mpsc::UnboundedSender<ActivityEvent>,
    receiver: Mutex<mpsc::UnboundedReceiver<ActivityEvent>>,
    len: AtomicUsize,
}

impl ActivityQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            len: AtomicUsize::new(0),
        }
    }

    /// Append an event to the back of the queue.
    pub fn enqueue(&self, event: ActivityEvent) {
        self.len.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.sender.send(event) {
            // Unreachable while the queue owns the receiver.
            self.len.fetch_sub(1, Ordering::SeqCst);
            error!(user_id = %e.0.user_id, "Activity queue closed, event dropped");
        }
    }

    /// Take up to `max` events from the front, in arrival order.
    pub async fn drain_batch(&self, max: usize) -> Vec<ActivityEvent> {
        let mut receiver = self.receiver.lock().await;
        let mut batch = Vec::with_capacity(max.min(self.len()));
        while batch.len() < max {
            match receiver.try_recv() {
                Ok(event) => batch.push(event),
                Err(_) => break,
            }
        }
        self.len.fetch_sub(batch.len(), Ordering::SeqCst);
        batch
    }

    /// Events waiting to be drained.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ActivityQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActivityKind;

    fn event(n: usize) -> ActivityEvent {
        ActivityEvent::new(
            format!("u{}", n),
            ActivityKind::PageView,
            serde_json::json!({"page": "/"}),
        )
    }

    #[tokio::test]
    async fn test_batches_are_bounded_and_fifo() {
        let queue = ActivityQueue::new();
        for n in 0..25 {
            queue.enqueue(event(n));
        }
        assert_eq!(queue.len(), 25);

        let first = queue.drain_batch(10).await;
        assert_eq!(first.len(), 10);
        assert_eq!(first[0].user_id, "u0");
        assert_eq!(first[9].user_id, "u9");
        assert_eq!(queue.len(), 15);

        let second = queue.drain_batch(10).await;
        assert_eq!(second[0].user_id, "u10");

        let third = queue.drain_batch(10).await;
        assert_eq!(third.len(), 5);
        assert_eq!(third[4].user_id, "u24");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_empty_drain_is_a_noop() {
        let queue = ActivityQueue::new();
        assert!(queue.drain_batch(10).await.is_empty());
        assert_eq!(queue.len(), 0);
    }
}
