use tracing::debug;

use crate::AuthError;

/// Static API key check guarding product creation
#[derive(Clone)]
pub struct ApiKeyGuard {
    expected: Option<String>,
}

impl std::fmt::Debug for ApiKeyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyGuard")
            .field("configured", &self.expected.is_some())
            .finish()
    }
}

impl ApiKeyGuard {
    pub fn new(expected: Option<String>) -> Self {
        Self {
            expected: expected.filter(|k| !k.is_empty()),
        }
    }

    pub fn check(&self, presented: Option<&str>) -> Result<(), AuthError> {
        match (&self.expected, presented) {
            (Some(expected), Some(presented)) if constant_time_eq(expected.as_bytes(), presented.as_bytes()) => {
                Ok(())
            }
            _ => {
                debug!("API key rejected");
                Err(AuthError::InvalidApiKey)
            }
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
