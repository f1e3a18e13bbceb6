use auth::{ApiKeyGuard, API_KEY_HEADER};
use cache::{keys, lookup, within, CacheLookup, CacheStore};
use common::metrics::{record_cache_request, record_coalesced_wait, CacheStatus};
use domain::commands::CreateProductInput;
use domain::{GatewayError, Product};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use upstream::ProductService;
use validator::Validate;

use super::inflight::{Flight, InFlight};
use crate::context::RequestContext;

const CACHE_TYPE: &str = "product";

/// Body sent to the product backend on creation
#[derive(Serialize)]
struct CreateProductBody<'a> {
    input: &'a CreateProductInput,
}

/// Cache-aside reads and API-key guarded writes for products.
///
/// Reads fail open: a cache that is down, slow to answer, or holding a
/// corrupt entry behaves like a miss. Cache writes never fail a read.
///
/// Concurrency caveats:
/// - Without coalescing, N concurrent misses on one key make N backend calls
///   and N cache writes (last writer wins).
/// - An invalidation landing between a listing fetch and its cache write is
///   overwritten by that write, so the stale listing survives until the next
///   inventory event.
pub struct ProductResolver {
    client: ProductService,
    cache: Arc<dyn CacheStore>,
    api_key: ApiKeyGuard,
    inflight: Option<Arc<InFlight>>,
    cache_timeout: Duration,
}

impl ProductResolver {
    pub fn new(client: ProductService, cache: Arc<dyn CacheStore>, api_key: ApiKeyGuard) -> Self {
        Self {
            client,
            cache,
            api_key,
            inflight: None,
            cache_timeout: cache::DEFAULT_TIMEOUT,
        }
    }

    /// Bound every cache read and write to `limit`
    pub fn with_cache_timeout(mut self, limit: Duration) -> Self {
        self.cache_timeout = limit;
        self
    }

    /// Share one backend fetch between concurrent misses on the same key
    pub fn with_coalescing(mut self) -> Self {
        self.inflight = Some(InFlight::new());
        self
    }

    pub async fn get_all_products(&self) -> Result<Vec<Product>, GatewayError> {
        self.cached(keys::PRODUCT_LIST, || self.client.get_all()).await
    }

    pub async fn get_product_by_id(&self, id: &str) -> Result<Product, GatewayError> {
        let key = keys::product(id);
        self.cached(&key, || self.client.get_by_id(id)).await
    }

    /// Check the API key, then forward exactly one `POST /`
    pub async fn create_product(
        &self,
        input: CreateProductInput,
        ctx: &RequestContext,
    ) -> Result<Product, GatewayError> {
        self.api_key.check(ctx.header(API_KEY_HEADER))?;
        input.validate()?;

        let product: Product = self
            .client
            .post(&CreateProductBody { input: &input }, &[])
            .await?;

        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    async fn cached<T, F, Fut>(&self, key: &str, fetch: F) -> Result<T, GatewayError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let cache_status = match lookup::<T>(self.cache.as_ref(), key, self.cache_timeout).await {
            CacheLookup::Hit(value) => {
                record_cache_request(CACHE_TYPE, CacheStatus::Hit);
                info!(key = %key, "Products cache hit");
                return Ok(value);
            }
            CacheLookup::Miss => CacheStatus::Miss,
            CacheLookup::Error(e) => {
                debug!(key = %key, error = %e, "Falling back to backend");
                CacheStatus::Error
            }
        };
        record_cache_request(CACHE_TYPE, cache_status);
        info!(key = %key, "Products cache miss");

        let Some(inflight) = &self.inflight else {
            return self.fetch_and_fill(key, fetch).await.map(|(value, _)| value);
        };

        match inflight.join(key) {
            Flight::Leader(guard) => match self.fetch_and_fill(key, fetch).await {
                Ok((value, serialized)) => {
                    guard.complete(serialized.ok_or_else(|| {
                        GatewayError::Upstream("response could not be shared".to_string())
                    }));
                    Ok(value)
                }
                Err(e) => {
                    guard.complete(Err(e.clone()));
                    Err(e)
                }
            },
            Flight::Follower(mut rx) => match rx.recv().await {
                Ok(shared) => {
                    record_coalesced_wait(CACHE_TYPE);
                    debug!(key = %key, "Joined in-flight fetch");
                    let raw = shared?;
                    serde_json::from_str(&raw).map_err(|e| {
                        GatewayError::Upstream(format!("Invalid shared response: {}", e))
                    })
                }
                Err(_) => {
                    debug!(key = %key, "In-flight fetch abandoned, fetching directly");
                    self.fetch_and_fill(key, fetch).await.map(|(value, _)| value)
                }
            },
        }
    }

    /// Fetch from the backend, then write the serialized value to the cache
    async fn fetch_and_fill<T, F, Fut>(
        &self,
        key: &str,
        fetch: F,
    ) -> Result<(T, Option<String>), GatewayError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let fetched = fetch().await?;

        let serialized = match serde_json::to_string(&fetched) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize value for cache");
                return Ok((fetched, None));
            }
        };

        if let Err(e) = within(self.cache_timeout, self.cache.set(key, &serialized)).await {
            warn!(key = %key, error = %e, "Failed to populate cache");
        }

        Ok((fetched, Some(serialized)))
    }
}

/// Variables of `products`; the id is accepted but the listing is returned
#[derive(Debug, Default, Deserialize)]
pub struct ProductsArgs {
    #[serde(default, deserialize_with = "domain::commands::deserialize_optional_id")]
    pub id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};
    use async_trait::async_trait;
    use cache::{CacheError, MemoryCache};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(server: &MockServer, cache: Arc<MemoryCache>) -> ProductResolver {
        let client =
            ProductService::new("product-service", &server.uri(), Duration::from_secs(2)).unwrap();
        ProductResolver::new(client, cache, ApiKeyGuard::new(Some("k-123".to_string())))
    }

    fn lamp() -> serde_json::Value {
        json!({"_id": "p1", "name": "Lamp", "price": 1200, "quantity": 3})
    }

    #[tokio::test]
    async fn test_miss_fills_cache_then_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": lamp()})))
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(MemoryCache::new());
        let resolver = resolver(&server, cache.clone());

        let first = resolver.get_product_by_id("p1").await.unwrap();
        assert!(cache.contains("products/p1").await);

        let second = resolver.get_product_by_id("p1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_corrupt_entry_falls_back_and_repairs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": [lamp()]})))
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(MemoryCache::new());
        cache.set("products/", "not json").await.unwrap();

        let products = resolver(&server, cache.clone()).get_all_products().await.unwrap();
        assert_eq!(products.len(), 1);

        let raw = cache.raw("products/").await.unwrap();
        assert_eq!(raw, serde_json::to_string(&products).unwrap());
    }

    #[tokio::test]
    async fn test_cache_down_still_serves() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": [lamp()]})))
            .expect(2)
            .mount(&server)
            .await;

        let cache = Arc::new(MemoryCache::new());
        cache.set_offline(true);
        let resolver = resolver(&server, cache);

        assert_eq!(resolver.get_all_products().await.unwrap().len(), 1);
        assert_eq!(resolver.get_all_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_backend_error_does_not_populate_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Product not Found"})))
            .mount(&server)
            .await;

        let cache = Arc::new(MemoryCache::new());
        let err = resolver(&server, cache.clone())
            .get_product_by_id("nope")
            .await
            .unwrap_err();

        assert_eq!(err, GatewayError::NotFound("Product not Found".to_string()));
        assert!(!cache.contains("products/nope").await);
    }

    #[tokio::test]
    async fn test_create_product_with_bad_key_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"result": lamp()})))
            .expect(0)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("wrong"));
        let input = CreateProductInput {
            name: "Lamp".to_string(),
            price: 1200,
            quantity: 3,
        };

        let err = resolver(&server, Arc::new(MemoryCache::new()))
            .create_product(input, &RequestContext::new(headers))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Unauthorized);
    }

    #[tokio::test]
    async fn test_coalesced_misses_fetch_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": lamp()}))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver(&server, Arc::new(MemoryCache::new())).with_coalescing();
        let (a, b, c) = tokio::join!(
            resolver.get_product_by_id("p1"),
            resolver.get_product_by_id("p1"),
            resolver.get_product_by_id("p1"),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(c.unwrap().id, "p1");
    }

    /// Accepts every call and never replies
    struct StalledCache;

    #[async_trait]
    impl CacheStore for StalledCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            std::future::pending().await
        }

        async fn ping(&self) -> Result<(), CacheError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_cache_falls_through_to_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": lamp()})))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ProductService::new("product-service", &server.uri(), Duration::from_secs(2)).unwrap();
        let resolver = ProductResolver::new(client, Arc::new(StalledCache), ApiKeyGuard::new(None))
            .with_cache_timeout(Duration::from_millis(50));

        let product = tokio::time::timeout(Duration::from_secs(3), resolver.get_product_by_id("p1"))
            .await
            .expect("read must not wait on the cache")
            .unwrap();
        assert_eq!(product.id, "p1");
    }
}
