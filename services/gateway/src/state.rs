use cache::CacheStore;
use common::GatewayConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use upstream::UpstreamError;

use crate::invalidator::InvalidatorState;
use crate::router::QueryRouter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<QueryRouter>,
    pub cache: Arc<dyn CacheStore>,
    pub invalidator: watch::Receiver<InvalidatorState>,
    pub cache_timeout: Duration,
}

impl AppState {
    pub fn new(
        config: &GatewayConfig,
        cache: Arc<dyn CacheStore>,
        invalidator: watch::Receiver<InvalidatorState>,
    ) -> Result<Self, UpstreamError> {
        tracing::info!("Initializing application state...");
        let router = Arc::new(QueryRouter::from_config(config, cache.clone())?);

        Ok(Self {
            router,
            cache,
            invalidator,
            cache_timeout: config.cache_timeout,
        })
    }
}
