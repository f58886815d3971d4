//! Materialized read models returned by the order workflows.

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, ProductId, UserId};
use domain::{Money, Order, OrderItem, OrderStatus, PaymentStatus};
use serde::Serialize;

/// Display name used when the user directory cannot resolve an order's user.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Display name used when the product catalog cannot resolve an item.
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemView {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl OrderItemView {
    pub fn new(item: &OrderItem, product_name: String) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id.clone(),
            product_name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            subtotal: item.subtotal,
        }
    }
}

/// An order with its user and product names resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub user_id: UserId,
    pub user_name: String,
    pub order_date: DateTime<Utc>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_address: String,
    pub payment_method: String,
    pub notes: Option<String>,
    pub transaction_id: Option<String>,
    pub items: Vec<OrderItemView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    pub fn new(order: Order, user_name: String, items: Vec<OrderItemView>) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            user_name,
            order_date: order.order_date,
            total_amount: order.total_amount,
            status: order.status,
            payment_status: order.payment_status,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            notes: order.notes,
            transaction_id: order.transaction_id,
            items,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}
