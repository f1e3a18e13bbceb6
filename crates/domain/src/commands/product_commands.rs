use serde::{Deserialize, Serialize};
use validator::Validate;

/// Input of `createProduct`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: String,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: i64,

    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i64,
}

/// Variables of the `createProduct` operation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProductCommand {
    #[validate(nested)]
    pub input: CreateProductInput,
}
