//! Shared identifier and versioning types for the order-fulfillment workspace.

pub mod types;

pub use types::{OrderId, OrderItemId, ProductId, UserId, Version};
