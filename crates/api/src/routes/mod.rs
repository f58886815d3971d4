//! Route handlers and the state they share.

pub mod inventory;
pub mod ops;
pub mod orders;

use common::{OrderId, UserId};
use fulfillment::{InventoryCoordinator, OrderOrchestrator, ProductCatalog, UserDirectory};
use store::Store;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store, U, P> {
    pub orchestrator: OrderOrchestrator<S, U, P>,
}

impl<S, U, P> AppState<S, U, P>
where
    S: Store,
    U: UserDirectory,
    P: ProductCatalog,
{
    pub fn new(orchestrator: OrderOrchestrator<S, U, P>) -> Self {
        Self { orchestrator }
    }

    pub fn inventory(&self) -> &InventoryCoordinator<S> {
        self.orchestrator.inventory()
    }
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}

pub(crate) fn parse_user_id(id: &str) -> Result<UserId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid user id: {e}")))?;
    Ok(UserId::from_uuid(uuid))
}
