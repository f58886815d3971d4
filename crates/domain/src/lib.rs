//! Domain layer for order fulfillment.
//!
//! This crate holds the pure parts of the system:
//! - [`StockRecord`] and the [`StockMovement`]s that are allowed to change it
//! - the [`Order`] aggregate with its line items and totals
//! - the order lifecycle policy ([`order::policy`]), the single source of truth
//!   for which status changes are legal
//!
//! Nothing here performs I/O; persistence lives in the `store` crate and the
//! workflows that combine both live in `fulfillment`.

pub mod money;
pub mod order;
pub mod stock;

pub use common::{OrderId, OrderItemId, ProductId, UserId, Version};
pub use money::Money;
pub use order::{
    CreateOrder, DEFAULT_PAYMENT_METHOD, Order, OrderError, OrderItem, OrderLine, OrderStatus,
    PaymentStatus, UpdateOrder, policy,
};
pub use stock::{DEFAULT_REORDER_LEVEL, StockError, StockMovement, StockRecord};
