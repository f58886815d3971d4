//! Order workflow inputs.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::OrderError;
use crate::Money;

/// One requested line of an order: a product, how many, and at what unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: self.product_id.clone(),
                quantity: self.quantity,
            });
        }
        if !self.unit_price.is_positive() {
            return Err(self.invalid_price());
        }
        self.subtotal().map(|_| ())
    }

    /// `quantity * unit_price`; fails when the product overflows.
    pub fn subtotal(&self) -> Result<Money, OrderError> {
        self.unit_price
            .checked_times(self.quantity)
            .ok_or_else(|| self.invalid_price())
    }

    fn invalid_price(&self) -> OrderError {
        OrderError::InvalidPrice {
            product_id: self.product_id.clone(),
            price: self.unit_price.cents(),
        }
    }
}

/// Validates a non-empty list of lines whose combined total fits in [`Money`].
pub(crate) fn validate_lines(lines: &[OrderLine]) -> Result<(), OrderError> {
    if lines.is_empty() {
        return Err(OrderError::NoItems);
    }
    let mut total = Money::zero();
    for line in lines {
        line.validate()?;
        total = line
            .subtotal()
            .ok()
            .and_then(|subtotal| total.checked_add(subtotal))
            .ok_or_else(|| line.invalid_price())?;
    }
    Ok(())
}

/// Request to place a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub user_id: UserId,
    pub shipping_address: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<OrderLine>,
}

impl CreateOrder {
    pub fn new(user_id: UserId, shipping_address: impl Into<String>, items: Vec<OrderLine>) -> Self {
        Self {
            user_id,
            shipping_address: shipping_address.into(),
            payment_method: None,
            notes: None,
            items,
        }
    }

    pub fn with_payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks the request shape: a shipping address and at least one valid line.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.shipping_address.trim().is_empty() {
            return Err(OrderError::BlankShippingAddress);
        }
        validate_lines(&self.items)
    }
}

/// Request to amend a pending order. `None` fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateOrder {
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Replacement line items; when present the old allocation is released
    /// and a fresh reservation is made.
    #[serde(default)]
    pub items: Option<Vec<OrderLine>>,
}

impl UpdateOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shipping_address(mut self, address: impl Into<String>) -> Self {
        self.shipping_address = Some(address.into());
        self
    }

    pub fn payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn items(mut self, items: Vec<OrderLine>) -> Self {
        self.items = Some(items);
        self
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        match &self.items {
            Some(items) => validate_lines(items),
            None => Ok(()),
        }
    }
}
