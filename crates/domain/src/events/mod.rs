pub mod inventory_events;

pub use inventory_events::InventoryEvent;
