use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, UserId, Version};
use domain::{Order, OrderStatus, StockMovement, StockRecord};
use tokio::sync::RwLock;

use crate::{
    MovementOutcome, OrderRepository, Result, StockRepository, Store, StoreError, Transaction,
};

#[derive(Debug, Default)]
struct Tables {
    stock: HashMap<ProductId, StockRecord>,
    orders: HashMap<OrderId, Order>,
}

/// A write staged by a transaction but not yet committed.
#[derive(Debug, Clone)]
struct Staged<T> {
    /// Version of the record the write was computed from; `None` when the
    /// record did not exist.
    base: Option<Version>,
    /// New value, or `None` for a delete.
    value: Option<T>,
}

/// In-memory store for tests and single-process deployments.
///
/// Transactions buffer their writes and validate them at commit time against
/// the committed record versions (optimistic concurrency). Commits are applied
/// under one write lock, so other transactions see either all of a commit or
/// none of it.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed quantity for a product, bypassing transactions.
    pub async fn stock_level(&self, product_id: &ProductId) -> Option<u32> {
        self.tables
            .read()
            .await
            .stock
            .get(product_id)
            .map(|record| record.quantity_available)
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Removes every record.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        tables.stock.clear();
        tables.orders.clear();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(InMemoryTransaction {
            tables: Arc::clone(&self.tables),
            stock: HashMap::new(),
            orders: HashMap::new(),
        })
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    stock: HashMap<ProductId, Staged<StockRecord>>,
    orders: HashMap<OrderId, Staged<Order>>,
}

/// Stages `value` under `key`. `read` is the version of the record the write
/// was computed from; the first write to a key pins it as the commit base.
fn stage<K: Eq + Hash, T>(
    staged: &mut HashMap<K, Staged<T>>,
    key: K,
    read: Option<Version>,
    value: Option<T>,
) {
    let base = staged.get(&key).map_or(read, |s| s.base);
    staged.insert(key, Staged { base, value });
}

impl InMemoryTransaction {
    async fn visible_stock(&self, product_id: &ProductId) -> Option<StockRecord> {
        match self.stock.get(product_id) {
            Some(staged) => staged.value.clone(),
            None => self.tables.read().await.stock.get(product_id).cloned(),
        }
    }

    async fn visible_order(&self, order_id: OrderId) -> Option<Order> {
        match self.orders.get(&order_id) {
            Some(staged) => staged.value.clone(),
            None => self.tables.read().await.orders.get(&order_id).cloned(),
        }
    }

    /// Committed orders overlaid with this transaction's staged writes.
    async fn visible_orders(&self) -> Vec<Order> {
        let tables = self.tables.read().await;
        let mut merged: HashMap<OrderId, Order> = tables.orders.clone();
        drop(tables);

        for (id, staged) in &self.orders {
            match &staged.value {
                Some(order) => {
                    merged.insert(*id, order.clone());
                }
                None => {
                    merged.remove(id);
                }
            }
        }
        merged.into_values().collect()
    }

    fn stage_stock(&mut self, read: Option<Version>, record: StockRecord) {
        stage(&mut self.stock, record.product_id.clone(), read, Some(record));
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
    orders
}

#[async_trait]
impl StockRepository for InMemoryTransaction {
    async fn find_stock(&mut self, product_id: &ProductId) -> Result<Option<StockRecord>> {
        Ok(self.visible_stock(product_id).await)
    }

    async fn find_stock_many(&mut self, product_ids: &[ProductId]) -> Result<Vec<StockRecord>> {
        let mut records = Vec::with_capacity(product_ids.len());
        for product_id in product_ids {
            if let Some(record) = self.visible_stock(product_id).await {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn list_stock(&mut self) -> Result<Vec<StockRecord>> {
        let mut merged = self.tables.read().await.stock.clone();
        for (id, staged) in &self.stock {
            if let Some(record) = &staged.value {
                merged.insert(id.clone(), record.clone());
            }
        }
        let mut records: Vec<_> = merged.into_values().collect();
        records.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        Ok(records)
    }

    async fn insert_stock(&mut self, record: &StockRecord) -> Result<StockRecord> {
        if self.visible_stock(&record.product_id).await.is_some() {
            return Err(StoreError::Duplicate {
                entity: "stock",
                key: record.product_id.to_string(),
            });
        }

        let mut stored = record.clone();
        stored.version = Version::first();
        self.stage_stock(None, stored.clone());
        Ok(stored)
    }

    async fn update_stock(&mut self, record: &StockRecord) -> Result<StockRecord> {
        let current = self.visible_stock(&record.product_id).await;
        if current.as_ref().map(|r| r.version) != Some(record.version) {
            return Err(StoreError::Conflict {
                entity: "stock",
                key: record.product_id.to_string(),
            });
        }

        let mut stored = record.clone();
        stored.version = record.version.next();
        self.stage_stock(Some(record.version), stored.clone());
        Ok(stored)
    }

    async fn apply_movement(
        &mut self,
        product_id: &ProductId,
        movement: StockMovement,
    ) -> Result<MovementOutcome> {
        let Some(mut record) = self.visible_stock(product_id).await else {
            return Ok(MovementOutcome::Missing);
        };

        if let Err(err) = movement.apply(&mut record, Utc::now()) {
            return Ok(MovementOutcome::Rejected(err));
        }

        let read = record.version;
        record.version = read.next();
        self.stage_stock(Some(read), record.clone());
        Ok(MovementOutcome::Applied(record))
    }
}

#[async_trait]
impl OrderRepository for InMemoryTransaction {
    async fn save_order(&mut self, order: &Order) -> Result<Order> {
        let current = self.visible_order(order.id).await;

        match (&current, order.version.is_initial()) {
            (Some(_), true) => {
                return Err(StoreError::Duplicate {
                    entity: "order",
                    key: order.id.to_string(),
                });
            }
            (None, false) => {
                return Err(StoreError::Conflict {
                    entity: "order",
                    key: order.id.to_string(),
                });
            }
            (Some(existing), false) if existing.version != order.version => {
                return Err(StoreError::Conflict {
                    entity: "order",
                    key: order.id.to_string(),
                });
            }
            _ => {}
        }

        let mut stored = order.clone();
        stored.version = order.version.next();
        let read = current.map(|o| o.version);
        stage(&mut self.orders, order.id, read, Some(stored.clone()));
        Ok(stored)
    }

    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.visible_order(order_id).await)
    }

    async fn find_orders_by_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let orders = self
            .visible_orders()
            .await
            .into_iter()
            .filter(|o| o.user_id == user_id)
            .collect();
        Ok(newest_first(orders))
    }

    async fn find_orders_by_status(&mut self, status: OrderStatus) -> Result<Vec<Order>> {
        let orders = self
            .visible_orders()
            .await
            .into_iter()
            .filter(|o| o.status == status)
            .collect();
        Ok(newest_first(orders))
    }

    async fn delete_order(&mut self, order: &Order) -> Result<()> {
        let current = self.visible_order(order.id).await;
        if current.as_ref().map(|o| o.version) != Some(order.version) {
            return Err(StoreError::Conflict {
                entity: "order",
                key: order.id.to_string(),
            });
        }

        stage(&mut self.orders, order.id, Some(order.version), None);
        Ok(())
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self) -> Result<()> {
        let mut tables = self.tables.write().await;

        // Validate every staged write before applying any of them.
        for (product_id, staged) in &self.stock {
            let committed = tables.stock.get(product_id).map(|r| r.version);
            if committed != staged.base {
                return Err(StoreError::Conflict {
                    entity: "stock",
                    key: product_id.to_string(),
                });
            }
        }
        for (order_id, staged) in &self.orders {
            let committed = tables.orders.get(order_id).map(|o| o.version);
            if committed != staged.base {
                return Err(StoreError::Conflict {
                    entity: "order",
                    key: order_id.to_string(),
                });
            }
        }

        for (product_id, staged) in self.stock {
            if let Some(record) = staged.value {
                tables.stock.insert(product_id, record);
            }
        }
        for (order_id, staged) in self.orders {
            match staged.value {
                Some(order) => {
                    tables.orders.insert(order_id, order);
                }
                None => {
                    tables.orders.remove(&order_id);
                }
            }
        }

        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        tracing::debug!(
            staged_stock = self.stock.len(),
            staged_orders = self.orders.len(),
            "discarding in-memory transaction"
        );
        Ok(())
    }
}
