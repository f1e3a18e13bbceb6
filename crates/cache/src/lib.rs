pub mod keys;
pub mod memory;
pub mod redis_cache;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Cache command failed: {0}")]
    Command(String),

    #[error("Corrupt cache entry for {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<CacheError> for domain::GatewayError {
    fn from(err: CacheError) -> Self {
        domain::GatewayError::Cache(err.to_string())
    }
}

/// Key/value store shared by every resolver.
///
/// Values are opaque serialized strings. Individual operations are atomic;
/// nothing here orders operations across callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store without expiry; entries live until deleted
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

/// Outcome of a typed cache read.
///
/// `Miss` and `Error` both lead to a backend fetch, but stay distinct so an
/// unavailable store is visible in logs and metrics.
#[derive(Debug)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    Error(CacheError),
}

impl<T> CacheLookup<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// Default bound on a single cache round-trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

/// Run one cache call, treating a store that does not answer in time as unreachable
pub async fn within<T, F>(limit: Duration, call: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, CacheError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Connection(format!(
            "no reply within {}ms",
            limit.as_millis()
        ))),
    }
}

/// Read `key` and deserialize it; corrupt entries and timeouts are reported as `Error`
pub async fn lookup<T: DeserializeOwned>(
    store: &dyn CacheStore,
    key: &str,
    limit: Duration,
) -> CacheLookup<T> {
    match within(limit, store.get(key)).await {
        Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                debug!(key = %key, "Cache hit");
                CacheLookup::Hit(value)
            }
            Err(source) => {
                warn!(key = %key, error = %source, "Failed to deserialize cached value");
                CacheLookup::Error(CacheError::Corrupt {
                    key: key.to_string(),
                    source,
                })
            }
        },
        Ok(None) => {
            debug!(key = %key, "Cache miss");
            CacheLookup::Miss
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Cache unavailable, treating as miss");
            CacheLookup::Error(e)
        }
    }
}
