//! Inventory coordinator: the only component that mutates stock records.
//!
//! Order workflows call the `*_in` primitives with their own open transaction
//! so reservations commit or roll back together with the order. The
//! standalone operations open a transaction per call and retry conflicts.

use chrono::Utc;
use common::ProductId;
use domain::{StockMovement, StockRecord};
use store::{MovementOutcome, StockRepository, Store};

use crate::config::RetryConfig;
use crate::error::{FulfillmentError, Result};
use crate::retry::retry_on_conflict;
use crate::transaction::finish;

fn ensure_positive(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(FulfillmentError::validation(
            "Quantity must be greater than 0",
        ));
    }
    Ok(())
}

fn applied(product_id: &ProductId, outcome: MovementOutcome) -> Result<StockRecord> {
    match outcome {
        MovementOutcome::Applied(record) => Ok(record),
        MovementOutcome::Rejected(err) => Err(err.into()),
        MovementOutcome::Missing => Err(FulfillmentError::not_found("stock", product_id)),
    }
}

/// Coordinates every change to the stock ledger.
#[derive(Clone)]
pub struct InventoryCoordinator<S: Store> {
    store: S,
    retry: RetryConfig,
}

impl<S: Store> InventoryCoordinator<S> {
    pub fn new(store: S, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    // ---- primitives inside a caller's transaction ----

    /// True iff a record exists with at least `quantity` available.
    pub async fn has_available_stock_in<T: StockRepository>(
        &self,
        tx: &mut T,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<bool> {
        Ok(tx
            .find_stock(product_id)
            .await?
            .is_some_and(|record| record.has_available(quantity)))
    }

    /// Fails with `InsufficientStock` unless `quantity` is available. A missing
    /// record counts as zero stock.
    pub async fn ensure_available_in<T: StockRepository>(
        &self,
        tx: &mut T,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<()> {
        let available = tx
            .find_stock(product_id)
            .await?
            .map_or(0, |record| record.quantity_available);

        if available < quantity {
            return Err(FulfillmentError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available,
            });
        }
        Ok(())
    }

    /// Decrements available stock within `tx`.
    pub async fn reserve_in<T: StockRepository>(
        &self,
        tx: &mut T,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<StockRecord> {
        ensure_positive(quantity)?;

        let outcome = tx
            .apply_movement(product_id, StockMovement::Reserve(quantity))
            .await?;
        match applied(product_id, outcome) {
            Ok(record) => {
                metrics::counter!("stock_reservations_total").increment(1);
                tracing::debug!(
                    product_id = %product_id,
                    quantity,
                    remaining = record.quantity_available,
                    "stock reserved"
                );
                Ok(record)
            }
            Err(err) => {
                metrics::counter!("stock_reservation_failures_total").increment(1);
                Err(err)
            }
        }
    }

    /// Increments available stock within `tx`. A missing record is an error,
    /// never a silent no-op.
    pub async fn release_in<T: StockRepository>(
        &self,
        tx: &mut T,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<StockRecord> {
        ensure_positive(quantity)?;

        let outcome = tx
            .apply_movement(product_id, StockMovement::Release(quantity))
            .await?;
        let record = applied(product_id, outcome)?;
        metrics::counter!("stock_releases_total").increment(1);
        tracing::debug!(
            product_id = %product_id,
            quantity,
            available = record.quantity_available,
            "stock released"
        );
        Ok(record)
    }

    // ---- standalone operations ----

    /// Never fails: a missing record or an unreadable store both read as
    /// "no stock".
    #[tracing::instrument(skip(self))]
    pub async fn has_available_stock(&self, product_id: &ProductId, quantity: u32) -> bool {
        let check = async {
            let mut tx = self.store.begin().await?;
            let outcome = self.has_available_stock_in(&mut tx, product_id, quantity).await;
            finish(tx, outcome).await
        };
        match check.await {
            Ok(available) => available,
            Err(err) => {
                tracing::warn!(error = %err, "stock check failed");
                false
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn reserve_stock(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        ensure_positive(quantity)?;
        retry_on_conflict(&self.retry, "reserve_stock", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = self.reserve_in(&mut tx, product_id, quantity).await;
            finish(tx, outcome).await
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn release_stock(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        ensure_positive(quantity)?;
        retry_on_conflict(&self.retry, "release_stock", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = self.release_in(&mut tx, product_id, quantity).await;
            finish(tx, outcome).await
        })
        .await
    }

    /// Manual restock. Stamps `last_restocked`.
    #[tracing::instrument(skip(self))]
    pub async fn add_stock(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        self.adjust(product_id, StockMovement::Restock(quantity), "add_stock")
            .await
    }

    /// Manual shrinkage; never drives the counter below zero.
    #[tracing::instrument(skip(self))]
    pub async fn remove_stock(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        self.adjust(product_id, StockMovement::Shrink(quantity), "remove_stock")
            .await
    }

    async fn adjust(
        &self,
        product_id: &ProductId,
        movement: StockMovement,
        operation: &'static str,
    ) -> Result<StockRecord> {
        ensure_positive(movement.quantity())?;
        let record = retry_on_conflict(&self.retry, operation, move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = match tx.apply_movement(product_id, movement).await {
                Ok(outcome) => applied(product_id, outcome),
                Err(err) => Err(err.into()),
            };
            finish(tx, outcome).await
        })
        .await?;

        tracing::info!(
            product_id = %product_id,
            movement = %movement,
            available = record.quantity_available,
            "stock adjusted"
        );
        Ok(record)
    }

    /// Creates the stock record for a new product.
    #[tracing::instrument(skip(self))]
    pub async fn create_stock(
        &self,
        product_id: &ProductId,
        initial_quantity: u32,
        reorder_level: u32,
        warehouse_location: Option<String>,
    ) -> Result<StockRecord> {
        let record = StockRecord::new(
            product_id.clone(),
            initial_quantity,
            reorder_level,
            warehouse_location,
            Utc::now(),
        );

        let record = &record;
        let created = retry_on_conflict(&self.retry, "create_stock", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = tx.insert_stock(record).await.map_err(FulfillmentError::from);
            finish(tx, outcome).await
        })
        .await?;

        tracing::info!(
            product_id = %product_id,
            quantity = created.quantity_available,
            reorder_level = created.reorder_level,
            "stock record created"
        );
        Ok(created)
    }

    /// Administrative correction to an absolute quantity. Not used by order
    /// workflows.
    #[tracing::instrument(skip(self))]
    pub async fn set_stock(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        self.rewrite(product_id, "set_stock", move |record| {
            record.quantity_available = quantity;
            Ok(())
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_reorder_level(
        &self,
        product_id: &ProductId,
        reorder_level: u32,
    ) -> Result<StockRecord> {
        if reorder_level == 0 {
            return Err(FulfillmentError::validation(
                "Reorder level must be greater than 0",
            ));
        }
        self.rewrite(product_id, "update_reorder_level", move |record| {
            record.reorder_level = reorder_level;
            Ok(())
        })
        .await
    }

    /// Read-modify-write of a whole record, guarded by its version.
    async fn rewrite<F>(
        &self,
        product_id: &ProductId,
        operation: &'static str,
        change: F,
    ) -> Result<StockRecord>
    where
        F: Fn(&mut StockRecord) -> Result<()> + Send + Sync,
    {
        let change = &change;
        let record = retry_on_conflict(&self.retry, operation, move || async move {
            let mut tx = self.store.begin().await?;
            let outcome: Result<StockRecord> = async {
                let mut record = tx
                    .find_stock(product_id)
                    .await?
                    .ok_or_else(|| FulfillmentError::not_found("stock", product_id))?;
                change(&mut record)?;
                record.updated_at = Utc::now();
                Ok(tx.update_stock(&record).await?)
            }
            .await;
            finish(tx, outcome).await
        })
        .await?;

        tracing::info!(
            product_id = %product_id,
            operation,
            quantity = record.quantity_available,
            reorder_level = record.reorder_level,
            "stock record updated"
        );
        Ok(record)
    }

    // ---- reads ----

    pub async fn get_stock(&self, product_id: &ProductId) -> Result<StockRecord> {
        let mut tx = self.store.begin().await?;
        let outcome = match tx.find_stock(product_id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(FulfillmentError::not_found("stock", product_id)),
            Err(err) => Err(err.into()),
        };
        finish(tx, outcome).await
    }

    /// False when the record is missing.
    pub async fn is_in_stock(&self, product_id: &ProductId) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        let outcome = tx
            .find_stock(product_id)
            .await
            .map(|record| record.is_some_and(|r| r.is_in_stock()))
            .map_err(FulfillmentError::from);
        finish(tx, outcome).await
    }

    /// Records for the products that have one. Empty input yields empty output.
    pub async fn stock_for_products(&self, product_ids: &[ProductId]) -> Result<Vec<StockRecord>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut tx = self.store.begin().await?;
        let outcome = tx
            .find_stock_many(product_ids)
            .await
            .map_err(FulfillmentError::from);
        finish(tx, outcome).await
    }

    pub async fn all_stock(&self) -> Result<Vec<StockRecord>> {
        self.filtered(|_| true).await
    }

    /// Records at or below their reorder level.
    pub async fn low_stock(&self) -> Result<Vec<StockRecord>> {
        self.filtered(StockRecord::is_low).await
    }

    pub async fn out_of_stock(&self) -> Result<Vec<StockRecord>> {
        self.filtered(StockRecord::is_out_of_stock).await
    }

    async fn filtered(&self, keep: impl Fn(&StockRecord) -> bool) -> Result<Vec<StockRecord>> {
        let mut tx = self.store.begin().await?;
        let outcome = tx
            .list_stock()
            .await
            .map(|records| records.into_iter().filter(|r| keep(r)).collect())
            .map_err(FulfillmentError::from);
        finish(tx, outcome).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{InMemoryStore, Transaction};

    async fn coordinator() -> (InventoryCoordinator<InMemoryStore>, InMemoryStore) {
        let store = InMemoryStore::new();
        let inventory = InventoryCoordinator::new(store.clone(), RetryConfig::default());
        inventory
            .create_stock(&ProductId::new("P1"), 10, 3, Some("A-1".to_string()))
            .await
            .unwrap();
        (inventory, store)
    }

    #[tokio::test]
    async fn reserve_then_release_restores_level() {
        let (inventory, _) = coordinator().await;
        let p1 = ProductId::new("P1");

        inventory.reserve_stock(&p1, 4).await.unwrap();
        assert_eq!(inventory.get_stock(&p1).await.unwrap().quantity_available, 6);

        inventory.release_stock(&p1, 4).await.unwrap();
        assert_eq!(inventory.get_stock(&p1).await.unwrap().quantity_available, 10);
    }

    #[tokio::test]
    async fn reserve_beyond_available_fails() {
        let (inventory, _) = coordinator().await;
        let p1 = ProductId::new("P1");

        let err = inventory.reserve_stock(&p1, 11).await.unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::InsufficientStock {
                requested: 11,
                available: 10,
                ..
            }
        ));
        assert_eq!(inventory.get_stock(&p1).await.unwrap().quantity_available, 10);
    }

    #[tokio::test]
    async fn zero_quantity_is_validation_error() {
        let (inventory, _) = coordinator().await;
        let p1 = ProductId::new("P1");

        for result in [
            inventory.reserve_stock(&p1, 0).await,
            inventory.release_stock(&p1, 0).await,
            inventory.add_stock(&p1, 0).await,
            inventory.remove_stock(&p1, 0).await,
        ] {
            assert!(matches!(result, Err(FulfillmentError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let (inventory, _) = coordinator().await;
        let nope = ProductId::new("NOPE");

        assert!(matches!(
            inventory.reserve_stock(&nope, 1).await,
            Err(FulfillmentError::NotFound { entity: "stock", .. })
        ));
        assert!(matches!(
            inventory.release_stock(&nope, 1).await,
            Err(FulfillmentError::NotFound { .. })
        ));
        assert!(!inventory.has_available_stock(&nope, 1).await);
        assert!(!inventory.is_in_stock(&nope).await.unwrap());
    }

    #[tokio::test]
    async fn has_available_stock_compares_quantity() {
        let (inventory, _) = coordinator().await;
        let p1 = ProductId::new("P1");

        assert!(inventory.has_available_stock(&p1, 10).await);
        assert!(!inventory.has_available_stock(&p1, 11).await);
    }

    #[tokio::test]
    async fn add_and_remove_stock() {
        let (inventory, _) = coordinator().await;
        let p1 = ProductId::new("P1");

        let record = inventory.add_stock(&p1, 5).await.unwrap();
        assert_eq!(record.quantity_available, 15);
        assert!(record.last_restocked.is_some());

        let record = inventory.remove_stock(&p1, 15).await.unwrap();
        assert_eq!(record.quantity_available, 0);

        assert!(matches!(
            inventory.remove_stock(&p1, 1).await,
            Err(FulfillmentError::InsufficientStock { .. })
        ));
    }

    #[tokio::test]
    async fn create_stock_twice_fails() {
        let (inventory, _) = coordinator().await;

        let result = inventory
            .create_stock(&ProductId::new("P1"), 1, 0, None)
            .await;
        assert!(matches!(
            result,
            Err(FulfillmentError::AlreadyExists { entity: "stock", .. })
        ));
    }

    #[tokio::test]
    async fn create_stock_defaults_reorder_level() {
        let (inventory, _) = coordinator().await;

        let record = inventory
            .create_stock(&ProductId::new("P2"), 1, 0, None)
            .await
            .unwrap();
        assert_eq!(record.reorder_level, domain::DEFAULT_REORDER_LEVEL);
    }

    #[tokio::test]
    async fn set_stock_and_reorder_level() {
        let (inventory, _) = coordinator().await;
        let p1 = ProductId::new("P1");

        let record = inventory.set_stock(&p1, 2).await.unwrap();
        assert_eq!(record.quantity_available, 2);
        let record = inventory.update_reorder_level(&p1, 7).await.unwrap();
        assert_eq!(record.reorder_level, 7);
        assert_eq!(record.quantity_available, 2);

        assert!(matches!(
            inventory.update_reorder_level(&p1, 0).await,
            Err(FulfillmentError::Validation(_))
        ));
        assert!(matches!(
            inventory.set_stock(&ProductId::new("NOPE"), 1).await,
            Err(FulfillmentError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn low_and_out_of_stock_reports() {
        let (inventory, _) = coordinator().await;
        inventory
            .create_stock(&ProductId::new("P2"), 0, 5, None)
            .await
            .unwrap();
        inventory
            .create_stock(&ProductId::new("P3"), 4, 5, None)
            .await
            .unwrap();

        let low: Vec<_> = inventory
            .low_stock()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.product_id)
            .collect();
        assert_eq!(low, vec![ProductId::new("P2"), ProductId::new("P3")]);

        let out = inventory.out_of_stock().await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].product_id, ProductId::new("P2"));
        assert_eq!(inventory.all_stock().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stock_for_products_skips_unknown_ids() {
        let (inventory, _) = coordinator().await;

        assert!(inventory.stock_for_products(&[]).await.unwrap().is_empty());
        let records = inventory
            .stock_for_products(&[ProductId::new("P1"), ProductId::new("NOPE")])
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn reservations_inside_a_rolled_back_transaction_vanish() {
        let (inventory, store) = coordinator().await;
        let p1 = ProductId::new("P1");

        let mut tx = store.begin().await.unwrap();
        inventory.reserve_in(&mut tx, &p1, 6).await.unwrap();
        assert!(!inventory.has_available_stock_in(&mut tx, &p1, 5).await.unwrap());
        tx.rollback().await.unwrap();

        assert_eq!(store.stock_level(&p1).await, Some(10));
    }
}
