//! Process-local expiring store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::PulseResult;
use crate::traits::ExpiringStore;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Instant,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory [`ExpiringStore`] backed by a `DashMap`.
///
/// Expiry is measured on the tokio clock, so paused-time tests can advance past a TTL.
/// Expired slots are dropped lazily on access or by [`purge_expired`](ExpiringStore::purge_expired).
#[derive(Debug, Default)]
pub struct MemoryExpiringStore {
    slots: DashMap<String, Slot>,
}

impl MemoryExpiringStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait]
impl ExpiringStore for MemoryExpiringStore {
    async fn get(&self, key: &str) -> PulseResult<Option<String>> {
        let now = Instant::now();
        if let Some(slot) = self.slots.get(key) {
            if slot.is_live(now) {
                return Ok(Some(slot.value.clone()));
            }
        }
        self.slots.remove_if(key, |_, slot| !slot.is_live(now));
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> PulseResult<()> {
        self.slots.insert(
            key.to_string(),
            Slot {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> PulseResult<bool> {
        let now = Instant::now();
        let slot = Slot {
            value,
            expires_at: now + ttl,
        };
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    Ok(false)
                } else {
                    occupied.insert(slot);
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> PulseResult<bool> {
        let now = Instant::now();
        Ok(self
            .slots
            .remove(key)
            .is_some_and(|(_, slot)| slot.is_live(now)))
    }

    async fn purge_expired(&self) -> PulseResult<usize> {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.is_live(now));
        Ok(before - self.slots.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_on_the_tokio_clock() {
        let store = MemoryExpiringStore::new();
        store
            .set_with_ttl("k", "v".to_string(), Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_if_absent_only_claims_once() {
        let store = MemoryExpiringStore::new();
        let ttl = Duration::from_secs(60);
        assert!(store.set_if_absent("k", "1".into(), ttl).await.unwrap());
        assert!(!store.set_if_absent("k", "2".into(), ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("1"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.set_if_absent("k", "3".into(), ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_and_purge() {
        let store = MemoryExpiringStore::new();
        store.set_with_ttl("a", "1".into(), Duration::from_secs(5)).await.unwrap();
        store.set_with_ttl("b", "2".into(), Duration::from_secs(50)).await.unwrap();

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());

        store.set_with_ttl("c", "3".into(), Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.exists("b").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_reclaims_keys_never_read_again() {
        let store = MemoryExpiringStore::new();
        for i in 0..1000 {
            let claimed = store
                .set_if_absent(&format!("cooldown:u{}:food", i), "1".into(), Duration::from_secs(300))
                .await
                .unwrap();
            assert!(claimed);
        }
        store
            .set_with_ttl("profile:keep", "{}".into(), Duration::from_secs(7200))
            .await
            .unwrap();
        assert_eq!(store.len(), 1001);

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(store.purge_expired().await.unwrap(), 1000);
        assert_eq!(store.len(), 1);
        assert!(store.exists("profile:keep").await.unwrap());
    }
}
