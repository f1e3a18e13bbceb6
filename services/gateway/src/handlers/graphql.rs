use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use domain::GatewayError;
use serde::Serialize;
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::router::OperationRequest;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub data: Value,
}

/// Single gateway endpoint: `{"operation": ..., "variables": ...}`
pub async fn handle(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: OperationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return ApiError(GatewayError::Validation(format!("Invalid request body: {}", e)))
                .into_response();
        }
    };

    let ctx = RequestContext::new(headers);
    match state.router.dispatch(request, &ctx).await {
        Ok(data) => (StatusCode::OK, Json(DataResponse { data })).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}
