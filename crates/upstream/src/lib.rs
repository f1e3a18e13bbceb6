//! Typed HTTP clients for the user, product and order backends.
//!
//! Every backend speaks the same contract: `GET /`, `GET /:id` and `POST /`,
//! answering `{"result": ...}` on success and `{"error": "..."}` otherwise.

pub mod client;
pub mod envelope;

pub use client::ServiceClient;
pub use envelope::UpstreamError;

use domain::{Order, Product, User};

pub type UserService = ServiceClient<User>;
pub type ProductService = ServiceClient<Product>;
pub type OrderService = ServiceClient<Order>;

/// Header carrying the caller identity verified by the gateway
pub const USER_ID_HEADER: &str = "x-user-id";
