//! Redis-backed expiring store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};

use crate::error::{PulseError, PulseResult};
use crate::traits::ExpiringStore;

/// [`ExpiringStore`] over Redis `SET ... EX` semantics.
pub struct RedisExpiringStore {
    connection: MultiplexedConnection,
    prefix: String,
}

impl RedisExpiringStore {
    /// Connect to Redis. Keys are namespaced under `prefix`.
    pub async fn new(url: &str, prefix: impl Into<String>) -> PulseResult<Self> {
        let client = Client::open(url)
            .map_err(|e| PulseError::cache_connection(format!("Failed to create Redis client: {}", e)))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PulseError::cache_connection(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            prefix: prefix.into(),
        })
    }

    fn key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.prefix, key)
        }
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl ExpiringStore for RedisExpiringStore {
    async fn get(&self, key: &str) -> PulseResult<Option<String>> {
        let mut conn = self.connection.clone();
        conn.get::<_, Option<String>>(self.key(key))
            .await
            .map_err(|e| PulseError::cache(format!("GET failed: {}", e)))
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> PulseResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| PulseError::cache(format!("SET EX failed: {}", e)))
    }

    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> PulseResult<bool> {
        let mut conn = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| PulseError::cache(format!("SET NX failed: {}", e)))?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> PulseResult<bool> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn
            .del::<_, i64>(self.key(key))
            .await
            .map_err(|e| PulseError::cache(format!("DEL failed: {}", e)))?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_unparseable_url_is_a_connection_failure() {
        let err = RedisExpiringStore::new("not-a-redis-url", "finpulse")
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), ErrorCode::KvConnectionFailed);
        assert!(err.is_transient());
    }

    #[test]
    fn test_ttl_rounds_up_to_one_second() {
        assert_eq!(ttl_secs(Duration::from_millis(200)), 1);
        assert_eq!(ttl_secs(Duration::from_secs(300)), 300);
    }
}
