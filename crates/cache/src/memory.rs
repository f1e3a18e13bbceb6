use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::{CacheError, CacheStore};

/// Process-local test double with the same semantics as [`crate::RedisCache`].
///
/// Can be switched offline to simulate an unreachable store.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
    offline: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a connection error (or recover)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Raw entry, bypassing the offline switch
    pub async fn raw(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Connection("memory cache is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_operations() {
        let cache = MemoryCache::new();

        cache.set("products/", "[]").await.unwrap();
        assert_eq!(cache.get("products/").await.unwrap().as_deref(), Some("[]"));

        cache.delete("products/").await.unwrap();
        assert!(cache.get("products/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_cache_fails() {
        let cache = MemoryCache::new();
        cache.set("k", "v").await.unwrap();
        cache.set_offline(true);

        assert!(cache.get("k").await.is_err());
        assert!(cache.ping().await.is_err());
        assert_eq!(cache.raw("k").await.as_deref(), Some("v"));

        cache.set_offline(false);
        assert!(cache.ping().await.is_ok());
    }
}
