//! Expiring key/value store used for cooldowns, cached profiles and
//! ephemeral per-user context.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::PulseResult;

/// Key/value store whose entries expire on their own.
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Get a live value. Expired entries are never returned.
    async fn get(&self, key: &str) -> PulseResult<Option<String>>;

    /// Set a value that expires after `ttl`, replacing any previous entry.
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> PulseResult<()>;

    /// Atomically set a value only if no live entry exists. Returns whether it was set.
    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> PulseResult<bool>;

    /// Delete an entry. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> PulseResult<bool>;

    /// Whether a live entry exists.
    async fn exists(&self, key: &str) -> PulseResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Drop expired entries the backend does not reclaim by itself.
    ///
    /// Returns how many were removed. Backends with native expiry keep the default.
    async fn purge_expired(&self) -> PulseResult<usize> {
        Ok(0)
    }
}
