//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, ProductId, UserId, Version};
use serde::{Deserialize, Serialize};

use super::commands::validate_lines;
use super::{CreateOrder, OrderError, OrderLine, OrderStatus, PaymentStatus, UpdateOrder, policy};
use crate::Money;

/// Payment method recorded when the request does not name one.
pub const DEFAULT_PAYMENT_METHOD: &str = "CASH";

/// A line of a persisted order. Owned exclusively by its [`Order`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    /// Always `quantity * unit_price`.
    pub subtotal: Money,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    fn from_line(
        order_id: OrderId,
        line: &OrderLine,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        Ok(Self {
            id: OrderItemId::new(),
            order_id,
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.subtotal()?,
            created_at: now,
        })
    }
}

fn items_from_lines(
    order_id: OrderId,
    lines: &[OrderLine],
    now: DateTime<Utc>,
) -> Result<Vec<OrderItem>, OrderError> {
    lines
        .iter()
        .map(|line| OrderItem::from_line(order_id, line, now))
        .collect()
}

/// Order aggregate root: header plus ordered line items.
///
/// `total_amount` is kept equal to the sum of item subtotals by every
/// constructor and mutator on this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_date: DateTime<Utc>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_address: String,
    pub payment_method: String,
    pub notes: Option<String>,
    /// Gateway reference recorded when payment is taken.
    pub transaction_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: Version,
}

impl Order {
    /// Builds a new, unsaved `Pending`/`Unpaid` order from a validated request.
    pub fn place(
        cmd: &CreateOrder,
        default_payment_method: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        cmd.validate()?;

        let id = OrderId::new();
        let items = items_from_lines(id, &cmd.items, now)?;

        let payment_method = match cmd.payment_method.as_deref().map(str::trim) {
            Some(method) if !method.is_empty() => method.to_string(),
            _ => default_payment_method.to_string(),
        };

        let mut order = Self {
            id,
            user_id: cmd.user_id,
            order_date: now,
            total_amount: Money::zero(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            shipping_address: cmd.shipping_address.trim().to_string(),
            payment_method,
            notes: cmd.notes.clone(),
            transaction_id: None,
            items,
            created_at: now,
            updated_at: now,
            version: Version::initial(),
        };
        order.total_amount = order.computed_total()?;
        Ok(order)
    }

    /// Sum of the item subtotals. Fails with the item whose subtotal pushed
    /// the sum out of range.
    pub fn computed_total(&self) -> Result<Money, OrderError> {
        self.items.iter().try_fold(Money::zero(), |total, item| {
            total
                .checked_add(item.subtotal)
                .ok_or_else(|| OrderError::InvalidPrice {
                    product_id: item.product_id.clone(),
                    price: item.unit_price.cents(),
                })
        })
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves the order to `requested` if the lifecycle policy allows it.
    pub fn transition_to(
        &mut self,
        requested: OrderStatus,
        operation: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        policy::ensure_transition(self.id, self.status, requested, operation)?;
        self.status = requested;
        self.updated_at = now;
        Ok(())
    }

    /// Fails unless the order's contents may still be changed.
    pub fn ensure_editable(&self, operation: &str) -> Result<(), OrderError> {
        policy::ensure_editable(self.id, self.status, operation)
    }

    /// Marks the order paid. Fails for an order that is already paid.
    pub fn record_payment(
        &mut self,
        transaction_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if self.payment_status == PaymentStatus::Paid {
            return Err(OrderError::InvalidState {
                order_id: self.id,
                current: self.status,
                operation: "process payment (already paid)".to_string(),
            });
        }
        self.payment_status = PaymentStatus::Paid;
        self.transaction_id = transaction_id;
        self.updated_at = now;
        Ok(())
    }

    /// Applies the scalar fields of an update. A blank shipping address is
    /// ignored rather than stored.
    pub fn apply_details(&mut self, update: &UpdateOrder, now: DateTime<Utc>) {
        if let Some(address) = update.shipping_address.as_deref()
            && !address.trim().is_empty()
        {
            self.shipping_address = address.trim().to_string();
        }
        if let Some(method) = &update.payment_method {
            self.payment_method = method.clone();
        }
        if let Some(notes) = &update.notes {
            self.notes = Some(notes.clone());
        }
        self.updated_at = now;
    }

    /// Replaces every line item and recomputes the total.
    pub fn replace_items(
        &mut self,
        lines: &[OrderLine],
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        self.ensure_editable("replace items")?;
        validate_lines(lines)?;

        let items = items_from_lines(self.id, lines, now)?;
        self.items = items;
        self.total_amount = self.computed_total()?;
        self.updated_at = now;
        Ok(())
    }
}
