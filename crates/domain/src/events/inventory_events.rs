use serde::Deserialize;

/// A message received on the inventory topic.
///
/// The baseline invalidator treats this purely as a signal; only the
/// per-product invalidation mode looks at the payload.
#[derive(Debug, Clone)]
pub struct InventoryEvent {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
}

#[derive(Deserialize)]
struct ProductRef {
    #[serde(alias = "product_id", alias = "_id")]
    #[serde(rename = "productId")]
    product_id: Option<String>,
}

impl InventoryEvent {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Option<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            payload,
        }
    }

    /// Product id carried by a JSON payload, if any
    pub fn product_id(&self) -> Option<String> {
        let payload = self.payload.as_deref()?;
        let reference: ProductRef = serde_json::from_slice(payload).ok()?;
        reference.product_id.filter(|id| !id.is_empty())
    }
}
