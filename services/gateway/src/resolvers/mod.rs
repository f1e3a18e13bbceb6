pub mod inflight;
pub mod orders;
pub mod products;
pub mod users;

pub use orders::OrderResolver;
pub use products::ProductResolver;
pub use users::UserResolver;
