use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use tracing::{debug, info};

use crate::{CacheError, CacheStore};

/// Redis-backed cache store.
///
/// One `RedisCache` is created at startup and shared by reference; the
/// connection manager reconnects on its own after transient failures.
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect and verify the server answers `PING`
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::Connection(format!("Failed to create Redis client: {}", e)))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        let cache = Self { conn };
        cache.ping().await?;

        info!("Redis cache connected");
        Ok(cache)
    }
}

fn command_error(e: RedisError) -> CacheError {
    if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() || e.is_timeout() {
        CacheError::Connection(e.to_string())
    } else {
        CacheError::Command(e.to_string())
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.conn
            .clone()
            .get::<_, Option<String>>(key)
            .await
            .map_err(command_error)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.conn
            .clone()
            .set::<_, _, ()>(key, value)
            .await
            .map_err(command_error)?;
        debug!(key = %key, "Cached value without expiry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let removed: i64 = self.conn.clone().del(key).await.map_err(command_error)?;
        debug!(key = %key, removed, "Deleted cache key");
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let result: Result<String, RedisError> = redis::cmd("PING")
            .query_async(&mut self.conn.clone())
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(CacheError::Connection(format!("Redis ping failed: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_cache_operations() {
        let cache = RedisCache::connect("redis://localhost:6379")
            .await
            .expect("Failed to connect to Redis");

        let key = "products/test-redis-cache";
        cache.set(key, r#"{"test":"data"}"#).await.unwrap();

        let cached = cache.get(key).await.unwrap();
        assert_eq!(cached.as_deref(), Some(r#"{"test":"data"}"#));

        cache.delete(key).await.unwrap();
        assert!(cache.get(key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_connect_invalid_url_fails() {
        let result = RedisCache::connect("not-a-redis-url").await;
        assert!(matches!(result, Err(CacheError::Connection(_))));
    }
}
