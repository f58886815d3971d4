//! Stock ledger records and the movements that change them.

use chrono::{DateTime, Utc};
use common::{ProductId, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reorder threshold applied when a record is created with a level of zero.
pub const DEFAULT_REORDER_LEVEL: u32 = 10;

/// Errors raised when a stock movement cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    Insufficient {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Invalid stock quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("Stock for product {product_id} would exceed the maximum counter value")]
    Overflow { product_id: ProductId },
}

/// Authoritative available quantity for one product.
///
/// `quantity_available` is unsigned, so the ledger can never record a
/// negative amount; movements that would go below zero are rejected instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub quantity_available: u32,
    pub reorder_level: u32,
    pub warehouse_location: Option<String>,
    pub last_restocked: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: Version,
}

impl StockRecord {
    /// Creates an unsaved record. A reorder level of 0 is replaced by
    /// [`DEFAULT_REORDER_LEVEL`].
    pub fn new(
        product_id: ProductId,
        quantity_available: u32,
        reorder_level: u32,
        warehouse_location: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let reorder_level = if reorder_level == 0 {
            DEFAULT_REORDER_LEVEL
        } else {
            reorder_level
        };

        Self {
            product_id,
            quantity_available,
            reorder_level,
            warehouse_location,
            last_restocked: Some(now),
            updated_at: now,
            version: Version::initial(),
        }
    }

    pub fn has_available(&self, quantity: u32) -> bool {
        self.quantity_available >= quantity
    }

    pub fn is_in_stock(&self) -> bool {
        self.quantity_available > 0
    }

    /// At or below the reorder threshold.
    pub fn is_low(&self) -> bool {
        self.quantity_available <= self.reorder_level
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity_available == 0
    }
}

/// A single change to a stock counter.
///
/// `Reserve`/`Release` are the only movements order workflows may issue;
/// `Restock`/`Shrink` are manual adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMovement {
    Reserve(u32),
    Release(u32),
    Restock(u32),
    Shrink(u32),
}

impl StockMovement {
    pub fn quantity(&self) -> u32 {
        match *self {
            StockMovement::Reserve(q)
            | StockMovement::Release(q)
            | StockMovement::Restock(q)
            | StockMovement::Shrink(q) => q,
        }
    }

    /// Signed change this movement makes to the available quantity.
    pub fn delta(&self) -> i64 {
        match *self {
            StockMovement::Reserve(q) | StockMovement::Shrink(q) => -i64::from(q),
            StockMovement::Release(q) | StockMovement::Restock(q) => i64::from(q),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockMovement::Reserve(_) => "reserve",
            StockMovement::Release(_) => "release",
            StockMovement::Restock(_) => "restock",
            StockMovement::Shrink(_) => "shrink",
        }
    }

    /// Applies the movement to `record` in place, or leaves it untouched and
    /// returns why it cannot be applied.
    pub fn apply(&self, record: &mut StockRecord, now: DateTime<Utc>) -> Result<(), StockError> {
        let quantity = self.quantity();
        if quantity == 0 {
            return Err(StockError::InvalidQuantity { quantity });
        }

        match self {
            StockMovement::Reserve(_) | StockMovement::Shrink(_) => {
                if !record.has_available(quantity) {
                    return Err(StockError::Insufficient {
                        product_id: record.product_id.clone(),
                        requested: quantity,
                        available: record.quantity_available,
                    });
                }
                record.quantity_available -= quantity;
            }
            StockMovement::Release(_) | StockMovement::Restock(_) => {
                record.quantity_available = record
                    .quantity_available
                    .checked_add(quantity)
                    .ok_or_else(|| StockError::Overflow {
                        product_id: record.product_id.clone(),
                    })?;
                if matches!(self, StockMovement::Restock(_)) {
                    record.last_restocked = Some(now);
                }
            }
        }

        record.updated_at = now;
        Ok(())
    }
}

impl std::fmt::Display for StockMovement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_str(), self.quantity())
    }
}
