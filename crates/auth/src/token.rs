use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::AuthError;

/// Claims issued by the user service at registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// Verifies HS256 bearer tokens signed with the shared secret
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: Option<DecodingKey>,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("has_secret", &self.decoding_key.is_some())
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(secret: Option<&str>) -> Self {
        let decoding_key = secret
            .filter(|s| !s.is_empty())
            .map(|s| DecodingKey::from_secret(s.as_bytes()));

        if decoding_key.is_none() {
            warn!("JWT secret not configured; every bearer token will be rejected");
        }

        // Tokens from the user service may omit `exp`; when present it is enforced.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = true;

        Self {
            decoding_key,
            validation,
        }
    }

    /// Strip the `Bearer ` prefix from an authorization header value
    pub fn extract_bearer_token(auth_header: Option<&str>) -> Result<&str, AuthError> {
        let value = auth_header.ok_or(AuthError::MissingAuthHeader)?;
        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or(AuthError::InvalidAuthFormat)?;

        if token.is_empty() {
            return Err(AuthError::InvalidAuthFormat);
        }
        Ok(token)
    }

    /// Verify the token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let key = self
            .decoding_key
            .as_ref()
            .ok_or(AuthError::SecretNotConfigured)?;

        let data = decode::<Claims>(token, key, &self.validation)?;
        if data.claims.user_id.is_empty() {
            return Err(AuthError::InvalidAuthFormat);
        }
        Ok(data.claims)
    }

    /// Resolve the caller identity from an `Authorization` header
    pub fn authenticate(&self, auth_header: Option<&str>) -> Result<String, AuthError> {
        let result = Self::extract_bearer_token(auth_header).and_then(|token| self.verify(token));

        match result {
            Ok(claims) => {
                debug!(user_id = %claims.user_id, "Bearer token verified");
                Ok(claims.user_id)
            }
            Err(e) => {
                debug!(error = %e, "Bearer token rejected");
                Err(e)
            }
        }
    }
}
