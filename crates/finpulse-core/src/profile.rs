//! Short-lived cache of user financial profile snapshots.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::traits::{ExpiringStore, FinanceStore};
use crate::types::UserFinancialProfileSnapshot;

/// Read-through cache in front of the persistence store.
///
/// Entries are replaced on refresh and expire after the configured TTL, so a
/// snapshot older than the TTL is never served.
#[derive(Clone)]
pub struct ProfileCache {
    cache: Arc<dyn ExpiringStore>,
    store: Arc<dyn FinanceStore>,
    ttl: Duration,
}

impl ProfileCache {
    pub fn new(cache: Arc<dyn ExpiringStore>, store: Arc<dyn FinanceStore>, ttl: Duration) -> Self {
        Self { cache, store, ttl }
    }

    fn key(user_id: &str) -> String {
        format!("profile:{}", user_id)
    }

    /// Get the user's snapshot. `None` for an unknown user or when the store is unavailable.
    pub async fn get(&self, user_id: &str) -> Option<UserFinancialProfileSnapshot> {
        let key = Self::key(user_id);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(snapshot) => {
                    debug!(user_id, "Profile cache hit");
                    return Some(snapshot);
                }
                Err(e) => warn!(user_id, error = %e, "Discarding undecodable cached profile"),
            },
            Ok(None) => {}
            Err(e) => warn!(user_id, error = %e, "Profile cache read failed"),
        }

        let record = match self.store.get_user(user_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to load user profile");
                return None;
            }
        };

        let snapshot = UserFinancialProfileSnapshot::from_record(&record);
        match serde_json::to_string(&snapshot) {
            Ok(raw) => {
                if let Err(e) = self.cache.set_with_ttl(&key, raw, self.ttl).await {
                    warn!(user_id, error = %e, "Failed to cache profile");
                }
            }
            Err(e) => warn!(user_id, error = %e, "Failed to encode profile"),
        }
        Some(snapshot)
    }

    /// Drop the cached snapshot after a profile change.
    pub async fn invalidate(&self, user_id: &str) {
        if let Err(e) = self.cache.delete(&Self::key(user_id)).await {
            warn!(user_id, error = %e, "Failed to invalidate cached profile");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PulseError;
    use crate::store::MemoryExpiringStore;
    use crate::traits::MockFinanceStore;
    use crate::types::UserRecord;

    fn cache_over(store: MockFinanceStore) -> ProfileCache {
        ProfileCache::new(
            Arc::new(MemoryExpiringStore::new()),
            Arc::new(store),
            Duration::from_secs(300),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_and_refresh_after() {
        let mut store = MockFinanceStore::new();
        store.expect_get_user().times(2).returning(|id| {
            Ok(Some(
                UserRecord::new(id).with_finances(5000.0, 3000.0, 12000.0, 0.0),
            ))
        });
        let cache = cache_over(store);

        let first = cache.get("u1").await.unwrap();
        assert_eq!(first.income, 5000.0);

        tokio::time::advance(Duration::from_secs(299)).await;
        let second = cache.get("u1").await.unwrap();
        assert_eq!(second, first);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("u1").await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_forces_a_store_read() {
        let mut store = MockFinanceStore::new();
        store
            .expect_get_user()
            .times(2)
            .returning(|id| Ok(Some(UserRecord::new(id))));
        let cache = cache_over(store);

        cache.get("u1").await.unwrap();
        cache.invalidate("u1").await;
        cache.get("u1").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_user_and_store_failure_yield_none() {
        let mut store = MockFinanceStore::new();
        store
            .expect_get_user()
            .withf(|id| id.to_string() == "ghost")
            .returning(|_| Ok(None));
        store
            .expect_get_user()
            .withf(|id| id.to_string() == "broken")
            .returning(|_| Err(PulseError::database("disk I/O error")));
        let cache = cache_over(store);

        assert!(cache.get("ghost").await.is_none());
        assert!(cache.get("broken").await.is_none());
    }
}
