use thiserror::Error;

/// Operation-level failures surfaced by the gateway.
///
/// `Cache` exists so store failures can be described and logged, but resolvers
/// downgrade it to a miss and it is never returned to a caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl GatewayError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Unauthorized => "unauthorized",
            GatewayError::Upstream(_) => "upstream",
            GatewayError::Cache(_) => "cache",
        }
    }

    /// Message returned to callers in the `{error}` body.
    ///
    /// Backend messages such as "Username already exists" are passed through
    /// without the variant prefix.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Validation(msg)
            | GatewayError::NotFound(msg)
            | GatewayError::Upstream(msg) => msg.clone(),
            GatewayError::Unauthorized => "Unauthorized".to_string(),
            GatewayError::Cache(_) => "Internal cache error".to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for GatewayError {
    fn from(errors: validator::ValidationErrors) -> Self {
        GatewayError::Validation(errors.to_string())
    }
}
