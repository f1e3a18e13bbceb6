use serde::{Deserialize, Serialize};
use validator::Validate;

/// One line of a `placeOrder` request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderProductInput {
    #[serde(rename = "_id")]
    #[validate(length(min = 1, message = "Product id cannot be empty"))]
    pub id: String,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i64,
}

/// Variables of the `placeOrder` operation; also the body sent to the order backend
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlaceOrderCommand {
    #[validate(length(min = 1, message = "Order must have at least one product"), nested)]
    pub products: Vec<OrderProductInput>,
}
