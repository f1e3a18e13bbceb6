pub mod consumer;

pub use consumer::{ConsumerError, EventSource, InventoryConsumer};
