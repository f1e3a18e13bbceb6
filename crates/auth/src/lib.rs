//! Caller authorization for mutating operations.
//!
//! Both checks fail closed: a missing secret or key rejects every request.

pub mod api_key;
pub mod token;

pub use api_key::ApiKeyGuard;
pub use token::{Claims, TokenVerifier};

use domain::GatewayError;
use thiserror::Error;

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthFormat,

    #[error("Token validation error: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Signing secret is not configured")]
    SecretNotConfigured,

    #[error("Invalid API key")]
    InvalidApiKey,
}

impl From<AuthError> for GatewayError {
    fn from(_: AuthError) -> Self {
        GatewayError::Unauthorized
    }
}
