use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{Order, OrderStatus, StockError, StockMovement, StockRecord};

use crate::Result;

/// Outcome of a conditional stock movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovementOutcome {
    /// The movement was applied; holds the record as it now reads.
    Applied(StockRecord),
    /// The record exists but the movement was refused; nothing changed.
    Rejected(StockError),
    /// No stock record exists for the product.
    Missing,
}

/// Stock ledger access within a transaction.
#[async_trait]
pub trait StockRepository: Send {
    async fn find_stock(&mut self, product_id: &ProductId) -> Result<Option<StockRecord>>;

    /// Returns the records that exist for `product_ids`, in no particular order.
    async fn find_stock_many(&mut self, product_ids: &[ProductId]) -> Result<Vec<StockRecord>>;

    async fn list_stock(&mut self) -> Result<Vec<StockRecord>>;

    /// Stores a new record. Fails with `Duplicate` if one already exists.
    async fn insert_stock(&mut self, record: &StockRecord) -> Result<StockRecord>;

    /// Overwrites a record previously read at `record.version`.
    ///
    /// Fails with `Conflict` if the record changed since it was read.
    async fn update_stock(&mut self, record: &StockRecord) -> Result<StockRecord>;

    /// Applies `movement` as a single read-modify-write on the product's
    /// counter. The counter is never observed below zero.
    async fn apply_movement(
        &mut self,
        product_id: &ProductId,
        movement: StockMovement,
    ) -> Result<MovementOutcome>;
}

/// Order persistence within a transaction.
#[async_trait]
pub trait OrderRepository: Send {
    /// Inserts an order at [`common::Version::initial`], otherwise updates the
    /// stored order if it is still at `order.version`. Items are replaced as a
    /// whole. Returns the order carrying its new version.
    async fn save_order(&mut self, order: &Order) -> Result<Order>;

    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    /// Orders placed by `user_id`, newest first.
    async fn find_orders_by_user(&mut self, user_id: UserId) -> Result<Vec<Order>>;

    /// Orders currently in `status`, newest first.
    async fn find_orders_by_status(&mut self, status: OrderStatus) -> Result<Vec<Order>>;

    /// Deletes an order and its items if it is still at `order.version`.
    async fn delete_order(&mut self, order: &Order) -> Result<()>;
}

/// A unit of work. Dropping a transaction without committing discards it.
#[async_trait]
pub trait Transaction: StockRepository + OrderRepository + Send + Sized {
    /// Makes every write of this transaction visible at once.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this transaction.
    async fn rollback(self) -> Result<()>;
}

/// Source of transactions. Implementations are cheap to clone and share one
/// underlying state.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: Transaction + 'static;

    async fn begin(&self) -> Result<Self::Tx>;
}
