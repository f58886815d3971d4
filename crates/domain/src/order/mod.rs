//! Order aggregate and related types.

mod aggregate;
mod commands;
pub mod policy;
mod state;

pub use aggregate::{DEFAULT_PAYMENT_METHOD, Order, OrderItem};
pub use commands::{CreateOrder, OrderLine, UpdateOrder};
pub use state::{OrderStatus, PaymentStatus};

use common::{OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The operation is not legal for the order's current status.
    #[error("Invalid order state: cannot {operation} order {order_id} in {current} status")]
    InvalidState {
        order_id: OrderId,
        current: OrderStatus,
        operation: String,
    },

    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// Non-positive unit price, or a price whose line or order total does
    /// not fit in the money range.
    #[error("Invalid price {price} for product {product_id}")]
    InvalidPrice { product_id: ProductId, price: i64 },

    #[error("Order must have at least one item")]
    NoItems,

    #[error("Shipping address is required")]
    BlankShippingAddress,
}
