pub mod order;
pub mod product;
pub mod user;

pub use order::{Order, OrderProduct};
pub use product::Product;
pub use user::{RegisterUserResult, User};
