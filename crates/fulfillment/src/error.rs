//! Fulfillment error types.

use common::{OrderId, ProductId};
use domain::{OrderError, OrderStatus, StockError};
use store::StoreError;
use thiserror::Error;

/// Errors returned by inventory and order workflows.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// A referenced user, order, product or stock record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Malformed input the caller can fix.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The operation is not legal for the order's current status.
    #[error("Cannot {operation} order {order_id} in status {current}")]
    InvalidOrderState {
        order_id: OrderId,
        current: OrderStatus,
        operation: String,
    },

    /// Concurrent modification that outlasted the retry budget.
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("Payment failed for order {order_id}: {reason}")]
    PaymentFailed { order_id: OrderId, reason: String },

    /// An external collaborator could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Unexpected storage failure.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl FulfillmentError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        FulfillmentError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        FulfillmentError::Validation(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, FulfillmentError::Conflict(_))
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => FulfillmentError::Conflict(err.to_string()),
            StoreError::Duplicate { entity, key } => {
                FulfillmentError::AlreadyExists { entity, id: key }
            }
            other => FulfillmentError::Store(other),
        }
    }
}

impl From<OrderError> for FulfillmentError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidState {
                order_id,
                current,
                operation,
            } => FulfillmentError::InvalidOrderState {
                order_id,
                current,
                operation,
            },
            other => FulfillmentError::Validation(other.to_string()),
        }
    }
}

impl From<StockError> for FulfillmentError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Insufficient {
                product_id,
                requested,
                available,
            } => FulfillmentError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            other => FulfillmentError::Validation(other.to_string()),
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflict_maps_to_conflict() {
        let err: FulfillmentError = StoreError::Conflict {
            entity: "stock",
            key: "P1".to_string(),
        }
        .into();
        assert!(err.is_conflict());
    }

    #[test]
    fn duplicate_maps_to_already_exists() {
        let err: FulfillmentError = StoreError::Duplicate {
            entity: "stock",
            key: "P1".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            FulfillmentError::AlreadyExists { entity: "stock", ref id } if id == "P1"
        ));
    }

    #[test]
    fn order_state_error_keeps_context() {
        let order_id = OrderId::new();
        let err: FulfillmentError = OrderError::InvalidState {
            order_id,
            current: OrderStatus::Cancelled,
            operation: "ship".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            FulfillmentError::InvalidOrderState { current: OrderStatus::Cancelled, .. }
        ));
    }

    #[test]
    fn order_shape_errors_are_validation() {
        let err: FulfillmentError = OrderError::NoItems.into();
        assert!(matches!(err, FulfillmentError::Validation(_)));
    }

    #[test]
    fn insufficient_stock_carries_quantities() {
        let err: FulfillmentError = StockError::Insufficient {
            product_id: ProductId::new("P1"),
            requested: 5,
            available: 2,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product P1: requested 5, available 2"
        );
    }
}
