//! Order lifecycle policy.
//!
//! This table is the only place that decides which status changes are legal.
//! Workflows ask it before every transition and never compare statuses on
//! their own.

use common::OrderId;

use super::{OrderError, OrderStatus};

/// Returns true if an order in `current` may move to `requested`.
pub fn can_transition(current: OrderStatus, requested: OrderStatus) -> bool {
    use OrderStatus::*;

    matches!(
        (current, requested),
        (Pending, Processing)
            | (Processing, Shipped)
            | (Shipped, Delivered)
            | (Pending, Cancelled)
            | (Processing, Cancelled)
    )
}

/// Returns true if the order's contents may be updated or the order deleted.
pub fn can_edit(current: OrderStatus) -> bool {
    current == OrderStatus::Pending
}

/// Like [`can_transition`] but reports a denial as an [`OrderError`].
pub fn ensure_transition(
    order_id: OrderId,
    current: OrderStatus,
    requested: OrderStatus,
    operation: &str,
) -> Result<(), OrderError> {
    if can_transition(current, requested) {
        Ok(())
    } else {
        Err(OrderError::InvalidState {
            order_id,
            current,
            operation: operation.to_string(),
        })
    }
}

/// Like [`can_edit`] but reports a denial as an [`OrderError`].
pub fn ensure_editable(
    order_id: OrderId,
    current: OrderStatus,
    operation: &str,
) -> Result<(), OrderError> {
    if can_edit(current) {
        Ok(())
    } else {
        Err(OrderError::InvalidState {
            order_id,
            current,
            operation: operation.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALLOWED: [(OrderStatus, OrderStatus); 5] = [
        (Pending, Processing),
        (Processing, Shipped),
        (Shipped, Delivered),
        (Pending, Cancelled),
        (Processing, Cancelled),
    ];

    #[test]
    fn only_listed_pairs_are_allowed() {
        for current in OrderStatus::ALL {
            for requested in OrderStatus::ALL {
                let expected = ALLOWED.contains(&(current, requested));
                assert_eq!(
                    can_transition(current, requested),
                    expected,
                    "{current} -> {requested}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for requested in OrderStatus::ALL {
            assert!(!can_transition(Delivered, requested));
            assert!(!can_transition(Cancelled, requested));
        }
    }

    #[test]
    fn skipping_steps_is_denied() {
        assert!(!can_transition(Pending, Shipped));
        assert!(!can_transition(Pending, Delivered));
        assert!(!can_transition(Processing, Delivered));
        assert!(!can_transition(Shipped, Cancelled));
    }

    #[test]
    fn only_pending_orders_are_editable() {
        for status in OrderStatus::ALL {
            assert_eq!(can_edit(status), status == Pending);
        }
    }

    #[test]
    fn denial_carries_order_status_and_operation() {
        let order_id = OrderId::new();
        let err = ensure_transition(order_id, Pending, Shipped, "ship").unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidState {
                order_id,
                current: Pending,
                operation: "ship".to_string(),
            }
        );
        assert!(ensure_editable(order_id, Processing, "update").is_err());
        assert!(ensure_editable(order_id, Pending, "update").is_ok());
    }
}
