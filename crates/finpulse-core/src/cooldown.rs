//! Per-(user, category) alert suppression over the expiring store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::PulseResult;
use crate::traits::ExpiringStore;

/// Tracks "an alert was already shown for this user and category".
#[derive(Clone)]
pub struct CooldownStore {
    store: Arc<dyn ExpiringStore>,
}

impl CooldownStore {
    pub fn new(store: Arc<dyn ExpiringStore>) -> Self {
        Self { store }
    }

    fn key(user_id: &str, category: &str) -> String {
        format!("cooldown:{}:{}", user_id, category)
    }

    /// True iff a live cooldown entry exists for exactly this pair.
    pub async fn is_in_cooldown(&self, user_id: &str, category: &str) -> PulseResult<bool> {
        self.store.exists(&Self::key(user_id, category)).await
    }

    /// Create or refresh the cooldown for this pair.
    pub async fn set_cooldown(
        &self,
        user_id: &str,
        category: &str,
        duration: Duration,
    ) -> PulseResult<()> {
        self.store
            .set_with_ttl(&Self::key(user_id, category), Utc::now().to_rfc3339(), duration)
            .await
    }

    /// Start the cooldown only if none is live. Returns whether this caller claimed it.
    ///
    /// Two concurrent scorers for the same pair cannot both claim.
    pub async fn try_claim(
        &self,
        user_id: &str,
        category: &str,
        duration: Duration,
    ) -> PulseResult<bool> {
        self.store
            .set_if_absent(&Self::key(user_id, category), Utc::now().to_rfc3339(), duration)
            .await
    }

    /// Lift the cooldown early.
    pub async fn clear(&self, user_id: &str, category: &str) -> PulseResult<bool> {
        self.store.delete(&Self::key(user_id, category)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryExpiringStore;

    fn cooldowns() -> CooldownStore {
        CooldownStore::new(Arc::new(MemoryExpiringStore::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_is_scoped_to_the_pair_and_expires() {
        let cooldowns = cooldowns();
        cooldowns
            .set_cooldown("u1", "shopping", Duration::from_secs(300))
            .await
            .unwrap();

        assert!(cooldowns.is_in_cooldown("u1", "shopping").await.unwrap());
        assert!(!cooldowns.is_in_cooldown("u1", "food").await.unwrap());
        assert!(!cooldowns.is_in_cooldown("u2", "shopping").await.unwrap());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cooldowns.is_in_cooldown("u1", "shopping").await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!cooldowns.is_in_cooldown("u1", "shopping").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_claim_is_exclusive() {
        let cooldowns = cooldowns();
        let ttl = Duration::from_secs(300);
        assert!(cooldowns.try_claim("u1", "food", ttl).await.unwrap());
        assert!(!cooldowns.try_claim("u1", "food", ttl).await.unwrap());

        assert!(cooldowns.clear("u1", "food").await.unwrap());
        assert!(cooldowns.try_claim("u1", "food", ttl).await.unwrap());
    }
}
