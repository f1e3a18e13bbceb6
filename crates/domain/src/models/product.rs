use serde::{Deserialize, Serialize};

/// Product as returned by the product backend.
///
/// The gateway never mutates a product; the backend is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub price: i64,
    pub quantity: i64,
}
