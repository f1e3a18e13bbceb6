pub mod order_commands;
pub mod product_commands;
pub mod user_commands;

use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

pub use order_commands::{OrderProductInput, PlaceOrderCommand};
pub use product_commands::{CreateProductCommand, CreateProductInput};
pub use user_commands::{RegisterUserCommand, RegisterUserInput};

/// Arguments of the single-entity read operations (`user`, `product`, `order`)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IdArgs {
    #[serde(deserialize_with = "deserialize_id")]
    #[validate(length(min = 1, message = "Id cannot be empty"))]
    pub id: String,
}

/// Ids arrive as strings or integers; both are carried as text
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }
    }
}

pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

pub fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_accepts_string_and_integer() {
        let text: IdArgs = serde_json::from_value(json!({"id": "p1"})).unwrap();
        let number: IdArgs = serde_json::from_value(json!({"id": 5})).unwrap();
        assert_eq!(text.id, "p1");
        assert_eq!(number.id, "5");
    }

    #[test]
    fn test_id_rejects_other_shapes() {
        assert!(serde_json::from_value::<IdArgs>(json!({"id": true})).is_err());
        assert!(serde_json::from_value::<IdArgs>(json!({"id": ["p1"]})).is_err());
        assert!(serde_json::from_value::<IdArgs>(json!({})).is_err());
    }
}
