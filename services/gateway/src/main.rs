use anyhow::{anyhow, Result};
use cache::{CacheStore, RedisCache};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use common::GatewayConfig;
use futures_util::stream::StreamExt;
use gateway::invalidator::InvalidatorError;
use gateway::{routes, AppState, EventInvalidator, InvalidatorState};
use messaging::InventoryConsumer;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{error, info, warn};

const SUBSCRIBE_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_telemetry(TelemetryConfig::from_env("gateway")).map_err(|e| anyhow!("{}", e))?;

    let config = GatewayConfig::from_env();
    info!("Starting gateway...");
    info!("Configuration:");
    info!("  Port: {}", config.port);
    info!("  User service: {}", config.backends.user_service_url);
    info!("  Product service: {}", config.backends.product_service_url);
    info!("  Order service: {}", config.backends.order_service_url);
    info!("  Kafka brokers: {}", config.kafka.brokers);
    info!("  Kafka topic: {}", config.kafka.topic);
    info!("  Invalidation mode: {}", config.invalidation_mode.as_str());
    info!("  Coalesce cache misses: {}", config.coalesce_misses);

    let result = run(config).await;
    if let Err(e) = &result {
        error!(error = %e, "Gateway stopped with a fatal error");
    }

    shutdown_telemetry();
    result
}

async fn run(config: GatewayConfig) -> Result<()> {
    info!("Connecting to Redis...");
    let cache: Arc<dyn CacheStore> = Arc::new(RedisCache::connect(&config.redis_url).await?);

    let (invalidator, invalidator_state) = EventInvalidator::new(
        cache.clone(),
        config.invalidation_mode,
        config.invalidator_max_retries,
    );
    let invalidator = invalidator.with_cache_timeout(config.cache_timeout);

    // Any failure from here on drops `cache`, releasing the connection before exit
    info!("Connecting to Kafka...");
    let mut consumer = InventoryConsumer::new(&config.kafka)?;
    invalidator.set_state(InvalidatorState::Connected);

    if let Err(e) = consumer.subscribe(SUBSCRIBE_PROBE_TIMEOUT) {
        consumer.disconnect();
        return Err(e.into());
    }
    invalidator.set_state(InvalidatorState::Subscribed);

    // The invalidator task owns the consumer once spawned; earlier exits release it here
    let state = match AppState::new(&config, cache.clone(), invalidator_state) {
        Ok(state) => state,
        Err(e) => {
            consumer.disconnect();
            return Err(e.into());
        }
    };
    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            consumer.disconnect();
            return Err(e.into());
        }
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    let (fatal_tx, fatal_rx) = oneshot::channel::<InvalidatorError>();

    let invalidator_task = tokio::spawn(async move {
        if let Err(e) = invalidator.run(&mut consumer, stop_rx).await {
            let _ = fatal_tx.send(e);
        }
        consumer.disconnect();
    });

    info!("Gateway listening on {}", addr);

    let failure: Arc<std::sync::Mutex<Option<String>>> = Arc::default();
    let failure_slot = failure.clone();
    let shutdown = async move {
        tokio::select! {
            _ = wait_for_signal() => info!("Received shutdown signal, stopping..."),
            Ok(e) = fatal_rx => {
                error!(error = %e, "Invalidation pipeline failed, stopping gateway");
                if let Ok(mut slot) = failure_slot.lock() {
                    *slot = Some(e.to_string());
                }
            }
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| {
            error!("Server error: {}", e);
            e
        })?;

    info!("Shutting down gateway...");
    let _ = stop_tx.send(true);
    if let Err(e) = invalidator_task.await {
        warn!(error = %e, "Invalidator task did not finish cleanly");
    }
    drop(cache);
    info!("Cache connection released");

    let failure = failure.lock().ok().and_then(|mut slot| slot.take());
    match failure {
        Some(reason) => Err(anyhow!("invalidator failed: {}", reason)),
        None => Ok(()),
    }
}

async fn wait_for_signal() {
    match Signals::new([SIGTERM, SIGINT]) {
        Ok(mut signals) => {
            let handle = signals.handle();
            signals.next().await;
            handle.close();
        }
        Err(e) => {
            warn!(error = %e, "Failed to install signal handlers, falling back to Ctrl-C");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
