pub mod commands;
pub mod errors;
pub mod events;
pub mod models;

pub use errors::GatewayError;
pub use events::inventory_events::InventoryEvent;
pub use models::{Order, OrderProduct, Product, RegisterUserResult, User};
