use axum::http::HeaderMap;
use uuid::Uuid;

/// Per-operation request data. Built fresh for every inbound operation and
/// never shared between operations.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub headers: HeaderMap,
}

impl RequestContext {
    pub fn new(headers: HeaderMap) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            headers,
        }
    }

    /// Header value as text; non-UTF-8 values are treated as absent
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(HeaderMap::new())
    }
}
