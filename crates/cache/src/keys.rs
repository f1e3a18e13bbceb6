//! Cache key layout for product reads.

/// Listing of all products; the only key the baseline invalidator deletes
pub const PRODUCT_LIST: &str = "products/";

/// Key of a single cached product
pub fn product(id: &str) -> String {
    format!("products/{}", id)
}
