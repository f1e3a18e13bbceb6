use domain::GatewayError;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Success body: `{"result": T}`
#[derive(Debug, Deserialize)]
pub(crate) struct ResultEnvelope<T> {
    pub result: Option<T>,
}

/// Failure body: `{"error": "message"}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {message}")]
    Transport { service: String, message: String },

    #[error("{service} timed out")]
    Timeout { service: String },

    #[error("{service} responded {status}: {message}")]
    Status {
        service: String,
        status: StatusCode,
        message: String,
    },

    #[error("{service} returned an invalid body: {message}")]
    InvalidBody { service: String, message: String },

    #[error("Invalid base URL for {service}: {message}")]
    InvalidUrl { service: String, message: String },
}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Status {
                status, message, ..
            } => match status {
                StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                    GatewayError::Validation(message)
                }
                StatusCode::NOT_FOUND => GatewayError::NotFound(message),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized,
                _ => GatewayError::Upstream(message),
            },
            other => GatewayError::Upstream(other.to_string()),
        }
    }
}

/// Message of a failed response: the backend's `{error}` if present,
/// otherwise the raw body or the status reason
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.len() > 512 {
        status
            .canonical_reason()
            .unwrap_or("Unexpected response")
            .to_string()
    } else {
        trimmed.to_string()
    }
}
