use cache::{keys, within, CacheError, CacheStore};
use common::metrics::record_invalidation;
use common::InvalidationMode;
use domain::InventoryEvent;
use messaging::{ConsumerError, EventSource};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Lifecycle of the invalidation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InvalidatorState {
    Disconnected,
    Connected,
    Subscribed,
    Consuming,
    Failed,
}

#[derive(Debug, Error)]
pub enum InvalidatorError {
    #[error("Failed to consume inventory events: {0}")]
    Consume(#[from] ConsumerError),

    #[error("Failed to invalidate cache: {0}")]
    Cache(#[from] CacheError),
}

/// Deletes product cache entries whenever an inventory event arrives.
///
/// In coarse mode only the listing key is deleted and the payload is never
/// read, so per-id entries can stay stale after an inventory change.
pub struct EventInvalidator {
    cache: Arc<dyn CacheStore>,
    mode: InvalidationMode,
    max_retries: u32,
    backoff: Duration,
    cache_timeout: Duration,
    state: watch::Sender<InvalidatorState>,
}

impl EventInvalidator {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        mode: InvalidationMode,
        max_retries: u32,
    ) -> (Self, watch::Receiver<InvalidatorState>) {
        let (state, state_rx) = watch::channel(InvalidatorState::Disconnected);
        (
            Self {
                cache,
                mode,
                max_retries,
                backoff: Duration::from_secs(1),
                cache_timeout: cache::DEFAULT_TIMEOUT,
                state,
            },
            state_rx,
        )
    }

    /// First retry delay; doubles per consecutive failure up to 30s
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Bound on each cache delete; an expired delete counts as a cache failure
    pub fn with_cache_timeout(mut self, limit: Duration) -> Self {
        self.cache_timeout = limit;
        self
    }

    pub fn state(&self) -> InvalidatorState {
        *self.state.borrow()
    }

    pub fn set_state(&self, next: InvalidatorState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = ?previous, to = ?next, "Invalidator state changed");
        }
    }

    /// Apply one event to the cache
    pub async fn handle(&self, event: &InventoryEvent) -> Result<(), CacheError> {
        info!(
            topic = %event.topic,
            partition = event.partition,
            offset = event.offset,
            "Inventory event received, invalidating product listing"
        );

        within(self.cache_timeout, self.cache.delete(keys::PRODUCT_LIST)).await?;

        if self.mode == InvalidationMode::PerProduct {
            if let Some(product_id) = event.product_id() {
                within(self.cache_timeout, self.cache.delete(&keys::product(&product_id))).await?;
                info!(product_id = %product_id, "Invalidated cached product");
            }
        }

        record_invalidation(self.mode.as_str());
        Ok(())
    }

    /// Consume until shutdown is requested or the error budget is exhausted.
    ///
    /// With `max_retries == 0` the first failure is returned immediately.
    pub async fn run<S: EventSource>(
        &self,
        source: &mut S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), InvalidatorError> {
        self.set_state(InvalidatorState::Consuming);
        let mut consecutive_failures: u32 = 0;

        loop {
            let step = tokio::select! {
                biased;
                Ok(()) = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Invalidator stopping");
                        self.set_state(InvalidatorState::Disconnected);
                        return Ok(());
                    }
                    continue;
                }
                next = source.next_event() => match next {
                    Ok(event) => self.handle(&event).await.map_err(InvalidatorError::from),
                    Err(e) => Err(InvalidatorError::from(e)),
                },
            };

            let err = match step {
                Ok(()) => {
                    consecutive_failures = 0;
                    continue;
                }
                Err(e) => e,
            };

            let closed = matches!(err, InvalidatorError::Consume(ConsumerError::Closed));
            if closed || consecutive_failures >= self.max_retries {
                error!(error = %err, failures = consecutive_failures + 1, "Invalidator failed");
                self.set_state(InvalidatorState::Failed);
                return Err(err);
            }

            let delay = self.backoff_for(consecutive_failures);
            consecutive_failures += 1;
            warn!(
                error = %err,
                attempt = consecutive_failures,
                max_retries = self.max_retries,
                delay_ms = %delay.as_millis(),
                "Invalidator error, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn backoff_for(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.min(16));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache::MemoryCache;
    use tokio::sync::mpsc;

    type Feed = mpsc::Sender<Result<InventoryEvent, ConsumerError>>;

    fn event(payload: Option<&[u8]>) -> InventoryEvent {
        InventoryEvent::new("inventory-events", 0, 1, payload.map(|p| p.to_vec()))
    }

    async fn seeded_cache() -> Arc<MemoryCache> {
        let cache = Arc::new(MemoryCache::new());
        cache.set("products/", "[]").await.unwrap();
        cache.set("products/p1", "{}").await.unwrap();
        cache
    }

    #[tokio::test]
    async fn test_coarse_mode_only_deletes_listing() {
        let cache = seeded_cache().await;
        let (invalidator, _) = EventInvalidator::new(cache.clone(), InvalidationMode::Coarse, 0);

        invalidator
            .handle(&event(Some(br#"{"productId":"p1"}"#)))
            .await
            .unwrap();

        assert!(!cache.contains("products/").await);
        assert!(cache.contains("products/p1").await);
    }

    #[tokio::test]
    async fn test_per_product_mode_deletes_named_product() {
        let cache = seeded_cache().await;
        let (invalidator, _) = EventInvalidator::new(cache.clone(), InvalidationMode::PerProduct, 0);

        invalidator
            .handle(&event(Some(br#"{"productId":"p1"}"#)))
            .await
            .unwrap();

        assert!(!cache.contains("products/").await);
        assert!(!cache.contains("products/p1").await);
    }

    #[tokio::test]
    async fn test_per_product_mode_with_opaque_payload() {
        let cache = seeded_cache().await;
        let (invalidator, _) = EventInvalidator::new(cache.clone(), InvalidationMode::PerProduct, 0);

        invalidator.handle(&event(Some(b"restocked"))).await.unwrap();

        assert!(!cache.contains("products/").await);
        assert!(cache.contains("products/p1").await);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let cache = seeded_cache().await;
        let (invalidator, state) = EventInvalidator::new(cache.clone(), InvalidationMode::Coarse, 0);
        let (_feed, mut source): (Feed, _) = mpsc::channel(4);
        let (stop_tx, stop_rx) = watch::channel(false);

        let run = invalidator.run(&mut source, stop_rx);
        let stop = async {
            tokio::task::yield_now().await;
            assert_eq!(*state.borrow(), InvalidatorState::Consuming);
            stop_tx.send(true).unwrap();
        };

        let (result, _) = tokio::join!(run, stop);
        assert!(result.is_ok());
        assert_eq!(invalidator.state(), InvalidatorState::Disconnected);
    }

    #[tokio::test]
    async fn test_first_error_is_fatal_without_retries() {
        let cache = seeded_cache().await;
        let (invalidator, _) = EventInvalidator::new(cache.clone(), InvalidationMode::Coarse, 0);
        let (feed, mut source): (Feed, _) = mpsc::channel(4);
        let (_stop_tx, stop_rx) = watch::channel(false);

        cache.set_offline(true);
        feed.send(Ok(event(None))).await.unwrap();

        let result = invalidator.run(&mut source, stop_rx).await;
        assert!(matches!(result, Err(InvalidatorError::Cache(_))));
        assert_eq!(invalidator.state(), InvalidatorState::Failed);
    }

    #[tokio::test]
    async fn test_retries_recover_then_closed_source_is_fatal() {
        let cache = seeded_cache().await;
        let (invalidator, _) = EventInvalidator::new(cache.clone(), InvalidationMode::Coarse, 2);
        let invalidator = invalidator.with_backoff(Duration::from_millis(1));
        let (feed, mut source): (Feed, _) = mpsc::channel(8);
        let (_stop_tx, stop_rx) = watch::channel(false);

        feed.send(Err(ConsumerError::Receive(rdkafka_error())))
            .await
            .unwrap();
        feed.send(Ok(event(None))).await.unwrap();
        drop(feed);

        let result = invalidator.run(&mut source, stop_rx).await;

        assert!(matches!(result, Err(InvalidatorError::Consume(ConsumerError::Closed))));
        assert!(!cache.contains("products/").await);
    }

    fn rdkafka_error() -> rdkafka::error::KafkaError {
        rdkafka::error::KafkaError::NoMessageReceived
    }

    #[test]
    fn test_backoff_is_capped() {
        let (invalidator, _) =
            EventInvalidator::new(Arc::new(MemoryCache::new()), InvalidationMode::Coarse, 10);
        assert_eq!(invalidator.backoff_for(0), Duration::from_secs(1));
        assert_eq!(invalidator.backoff_for(3), Duration::from_secs(8));
        assert_eq!(invalidator.backoff_for(9), MAX_BACKOFF);
    }
}
