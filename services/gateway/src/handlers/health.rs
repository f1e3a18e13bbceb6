use axum::{extract::State, http::StatusCode, Json};
use cache::within;
use serde::Serialize;

use crate::invalidator::InvalidatorState;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub cache: String,
    pub invalidator: InvalidatorState,
}

/// Healthy when the cache answers and the invalidator is consuming
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let cache_ok = within(state.cache_timeout, state.cache.ping()).await.is_ok();
    let invalidator = *state.invalidator.borrow();
    let healthy = cache_ok && invalidator == InvalidatorState::Consuming;

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            service: "gateway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cache: if cache_ok { "up" } else { "down" }.to_string(),
            invalidator,
        }),
    )
}
