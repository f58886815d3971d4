use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, ProductId, UserId, Version};
use domain::{
    Money, Order, OrderItem, OrderStatus, PaymentStatus, StockError, StockMovement, StockRecord,
};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    MovementOutcome, OrderRepository, Result, StockRepository, Store, StoreError, Transaction,
};

const STOCK_COLUMNS: &str = "product_id, quantity_available, reorder_level, warehouse_location, \
     last_restocked, updated_at, version";

const ORDER_COLUMNS: &str = "order_id, user_id, order_date, total_amount_cents, status, \
     payment_status, shipping_address, payment_method, notes, transaction_id, created_at, \
     updated_at, version";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(PostgresTransaction { tx })
    }
}

/// A `SERIALIZABLE` database transaction. Serialization failures surface as
/// [`StoreError::Conflict`], either from a statement or from `commit`.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn row_to_stock(row: &PgRow) -> Result<StockRecord> {
    Ok(StockRecord {
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        quantity_available: to_u32(row.try_get("quantity_available")?, "quantity_available")?,
        reorder_level: to_u32(row.try_get("reorder_level")?, "reorder_level")?,
        warehouse_location: row.try_get("warehouse_location")?,
        last_restocked: row.try_get::<Option<DateTime<Utc>>, _>("last_restocked")?,
        updated_at: row.try_get("updated_at")?,
        version: Version::new(row.try_get("version")?),
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        order_date: row.try_get("order_date")?,
        total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
        status: status.parse::<OrderStatus>().map_err(StoreError::Corrupt)?,
        payment_status: payment_status
            .parse::<PaymentStatus>()
            .map_err(StoreError::Corrupt)?,
        shipping_address: row.try_get("shipping_address")?,
        payment_method: row.try_get("payment_method")?,
        notes: row.try_get("notes")?,
        transaction_id: row.try_get("transaction_id")?,
        items: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        version: Version::new(row.try_get("version")?),
    })
}

fn row_to_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("order_item_id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        created_at: row.try_get("created_at")?,
    })
}

impl PostgresTransaction {
    /// Loads the items of `orders` in one query and attaches them.
    async fn attach_items(&mut self, mut orders: Vec<Order>) -> Result<Vec<Order>> {
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT order_item_id, order_id, product_id, quantity, unit_price_cents,
                   subtotal_cents, created_at
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let item = row_to_item(row)?;
            by_order.entry(item.order_id).or_default().push(item);
        }

        for order in &mut orders {
            order.items = by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(orders)
    }

    async fn fetch_orders(&mut self, sql: &str, bind: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query(sql).bind(bind).fetch_all(&mut *self.tx).await?;
        let orders = rows.iter().map(row_to_order).collect::<Result<Vec<_>>>()?;
        self.attach_items(orders).await
    }

    async fn insert_items(&mut self, order: &Order) -> Result<()> {
        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_item_id, order_id, position, product_id, quantity,
                                         unit_price_cents, subtotal_cents, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_str())
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.cents())
            .bind(item.subtotal.cents())
            .bind(item.created_at)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StockRepository for PostgresTransaction {
    async fn find_stock(&mut self, product_id: &ProductId) -> Result<Option<StockRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {STOCK_COLUMNS} FROM stock WHERE product_id = $1"
        ))
        .bind(product_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_stock).transpose()
    }

    async fn find_stock_many(&mut self, product_ids: &[ProductId]) -> Result<Vec<StockRecord>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = product_ids.iter().map(|p| p.as_str().to_string()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {STOCK_COLUMNS} FROM stock WHERE product_id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_stock).collect()
    }

    async fn list_stock(&mut self) -> Result<Vec<StockRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {STOCK_COLUMNS} FROM stock ORDER BY product_id ASC"
        ))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_stock).collect()
    }

    async fn insert_stock(&mut self, record: &StockRecord) -> Result<StockRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO stock (product_id, quantity_available, reorder_level, warehouse_location,
                               last_restocked, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, 1)
            ON CONFLICT (product_id) DO NOTHING
            RETURNING {STOCK_COLUMNS}
            "#
        ))
        .bind(record.product_id.as_str())
        .bind(i64::from(record.quantity_available))
        .bind(i64::from(record.reorder_level))
        .bind(record.warehouse_location.as_deref())
        .bind(record.last_restocked)
        .bind(record.updated_at)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row_to_stock(&row),
            None => Err(StoreError::Duplicate {
                entity: "stock",
                key: record.product_id.to_string(),
            }),
        }
    }

    async fn update_stock(&mut self, record: &StockRecord) -> Result<StockRecord> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE stock
            SET quantity_available = $3, reorder_level = $4, warehouse_location = $5,
                last_restocked = $6, updated_at = $7, version = version + 1
            WHERE product_id = $1 AND version = $2
            RETURNING {STOCK_COLUMNS}
            "#
        ))
        .bind(record.product_id.as_str())
        .bind(record.version.as_i64())
        .bind(i64::from(record.quantity_available))
        .bind(i64::from(record.reorder_level))
        .bind(record.warehouse_location.as_deref())
        .bind(record.last_restocked)
        .bind(record.updated_at)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row_to_stock(&row),
            None => Err(StoreError::Conflict {
                entity: "stock",
                key: record.product_id.to_string(),
            }),
        }
    }

    async fn apply_movement(
        &mut self,
        product_id: &ProductId,
        movement: StockMovement,
    ) -> Result<MovementOutcome> {
        let quantity = movement.quantity();
        if quantity == 0 {
            return Ok(MovementOutcome::Rejected(StockError::InvalidQuantity {
                quantity,
            }));
        }

        let now = Utc::now();
        let restock = matches!(movement, StockMovement::Restock(_));

        // One conditional statement per movement: the guard and the write
        // cannot be separated by another writer.
        let row = sqlx::query(&format!(
            r#"
            UPDATE stock
            SET quantity_available = quantity_available + $2,
                last_restocked = CASE WHEN $4 THEN $3 ELSE last_restocked END,
                updated_at = $3,
                version = version + 1
            WHERE product_id = $1
              AND quantity_available + $2 BETWEEN 0 AND {max}
            RETURNING {STOCK_COLUMNS}
            "#,
            max = u32::MAX
        ))
        .bind(product_id.as_str())
        .bind(movement.delta())
        .bind(now)
        .bind(restock)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(row) = row {
            return Ok(MovementOutcome::Applied(row_to_stock(&row)?));
        }

        // Nothing matched: either there is no record or the guard refused.
        let Some(mut current) = self.find_stock(product_id).await? else {
            return Ok(MovementOutcome::Missing);
        };
        match movement.apply(&mut current, now) {
            Err(err) => Ok(MovementOutcome::Rejected(err)),
            Ok(()) => Err(StoreError::Conflict {
                entity: "stock",
                key: product_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl OrderRepository for PostgresTransaction {
    async fn save_order(&mut self, order: &Order) -> Result<Order> {
        if order.version.is_initial() {
            sqlx::query(
                r#"
                INSERT INTO orders (order_id, user_id, order_date, total_amount_cents, status,
                                    payment_status, shipping_address, payment_method, notes,
                                    transaction_id, created_at, updated_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 1)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(order.user_id.as_uuid())
            .bind(order.order_date)
            .bind(order.total_amount.cents())
            .bind(order.status.as_str())
            .bind(order.payment_status.as_str())
            .bind(&order.shipping_address)
            .bind(&order.payment_method)
            .bind(order.notes.as_deref())
            .bind(order.transaction_id.as_deref())
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Duplicate { .. } => StoreError::Duplicate {
                    entity: "order",
                    key: order.id.to_string(),
                },
                other => other,
            })?;
        } else {
            let result = sqlx::query(
                r#"
                UPDATE orders
                SET total_amount_cents = $3, status = $4, payment_status = $5,
                    shipping_address = $6, payment_method = $7, notes = $8,
                    transaction_id = $9, updated_at = $10, version = version + 1
                WHERE order_id = $1 AND version = $2
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(order.version.as_i64())
            .bind(order.total_amount.cents())
            .bind(order.status.as_str())
            .bind(order.payment_status.as_str())
            .bind(&order.shipping_address)
            .bind(&order.payment_method)
            .bind(order.notes.as_deref())
            .bind(order.transaction_id.as_deref())
            .bind(order.updated_at)
            .execute(&mut *self.tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict {
                    entity: "order",
                    key: order.id.to_string(),
                });
            }

            sqlx::query("DELETE FROM order_items WHERE order_id = $1")
                .bind(order.id.as_uuid())
                .execute(&mut *self.tx)
                .await?;
        }

        self.insert_items(order).await?;

        let mut stored = order.clone();
        stored.version = order.version.next();
        Ok(stored)
    }

    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        let mut orders = self
            .fetch_orders(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"),
                order_id.as_uuid(),
            )
            .await?;
        Ok(orders.pop())
    }

    async fn find_orders_by_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        self.fetch_orders(
            &format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY order_date DESC"
            ),
            user_id.as_uuid(),
        )
        .await
    }

    async fn find_orders_by_status(&mut self, status: OrderStatus) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY order_date DESC"
        ))
        .bind(status.as_str())
        .fetch_all(&mut *self.tx)
        .await?;

        let orders = rows.iter().map(row_to_order).collect::<Result<Vec<_>>>()?;
        self.attach_items(orders).await
    }

    async fn delete_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query("DELETE FROM orders WHERE order_id = $1 AND version = $2")
            .bind(order.id.as_uuid())
            .bind(order.version.as_i64())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                entity: "order",
                key: order.id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
