//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use domain::{
    CreateOrder, DEFAULT_PAYMENT_METHOD, Money, Order, OrderLine, OrderStatus, PaymentStatus,
    ProductId, StockError, StockMovement, StockRecord, UserId, Version,
};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    MovementOutcome, OrderRepository, PostgresStore, StockRepository, Store, StoreError,
    Transaction,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_fulfillment_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh store with its own pool and empty tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders, stock")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

async fn seed_stock(store: &PostgresStore, product: &str, quantity: u32) {
    let mut tx = store.begin().await.unwrap();
    let record = StockRecord::new(ProductId::new(product), quantity, 5, None, Utc::now());
    tx.insert_stock(&record).await.unwrap();
    tx.commit().await.unwrap();
}

async fn stock_level(store: &PostgresStore, product: &str) -> Option<u32> {
    let mut tx = store.begin().await.unwrap();
    let record = tx.find_stock(&ProductId::new(product)).await.unwrap();
    tx.rollback().await.unwrap();
    record.map(|r| r.quantity_available)
}

fn new_order(lines: Vec<OrderLine>) -> Order {
    let cmd = CreateOrder::new(UserId::new(), "1 Main St", lines).with_notes("fragile");
    Order::place(&cmd, DEFAULT_PAYMENT_METHOD, Utc::now()).unwrap()
}

#[tokio::test]
#[serial]
async fn insert_and_find_stock() {
    let store = get_test_store().await;
    seed_stock(&store, "P1", 10).await;

    let mut tx = store.begin().await.unwrap();
    let record = tx.find_stock(&ProductId::new("P1")).await.unwrap().unwrap();
    assert_eq!(record.quantity_available, 10);
    assert_eq!(record.reorder_level, 5);
    assert_eq!(record.version, Version::first());

    let many = tx
        .find_stock_many(&[ProductId::new("P1"), ProductId::new("NOPE")])
        .await
        .unwrap();
    assert_eq!(many.len(), 1);
}

#[tokio::test]
#[serial]
async fn duplicate_stock_is_rejected() {
    let store = get_test_store().await;
    seed_stock(&store, "P1", 10).await;

    let mut tx = store.begin().await.unwrap();
    let record = StockRecord::new(ProductId::new("P1"), 1, 0, None, Utc::now());
    let result = tx.insert_stock(&record).await;
    assert!(matches!(result, Err(StoreError::Duplicate { entity: "stock", .. })));
}

#[tokio::test]
#[serial]
async fn reserve_and_release_movements() {
    let store = get_test_store().await;
    seed_stock(&store, "P1", 10).await;
    let p1 = ProductId::new("P1");

    let mut tx = store.begin().await.unwrap();
    let outcome = tx
        .apply_movement(&p1, StockMovement::Reserve(4))
        .await
        .unwrap();
    assert!(matches!(outcome, MovementOutcome::Applied(ref r) if r.quantity_available == 6));

    let outcome = tx
        .apply_movement(&p1, StockMovement::Release(1))
        .await
        .unwrap();
    assert!(matches!(outcome, MovementOutcome::Applied(ref r) if r.quantity_available == 7));
    tx.commit().await.unwrap();

    assert_eq!(stock_level(&store, "P1").await, Some(7));
}

#[tokio::test]
#[serial]
async fn reserve_beyond_available_is_rejected() {
    let store = get_test_store().await;
    seed_stock(&store, "P1", 2).await;

    let mut tx = store.begin().await.unwrap();
    let outcome = tx
        .apply_movement(&ProductId::new("P1"), StockMovement::Reserve(3))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        MovementOutcome::Rejected(StockError::Insufficient {
            product_id: ProductId::new("P1"),
            requested: 3,
            available: 2,
        })
    );
    tx.commit().await.unwrap();

    assert_eq!(stock_level(&store, "P1").await, Some(2));
}

#[tokio::test]
#[serial]
async fn movement_on_missing_product() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let outcome = tx
        .apply_movement(&ProductId::new("NOPE"), StockMovement::Reserve(1))
        .await
        .unwrap();
    assert_eq!(outcome, MovementOutcome::Missing);
}

#[tokio::test]
#[serial]
async fn rollback_discards_movements() {
    let store = get_test_store().await;
    seed_stock(&store, "P1", 10).await;

    let mut tx = store.begin().await.unwrap();
    tx.apply_movement(&ProductId::new("P1"), StockMovement::Reserve(10))
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(stock_level(&store, "P1").await, Some(10));
}

#[tokio::test]
#[serial]
async fn stale_stock_update_conflicts() {
    let store = get_test_store().await;
    seed_stock(&store, "P1", 10).await;

    let mut tx = store.begin().await.unwrap();
    let mut record = tx.find_stock(&ProductId::new("P1")).await.unwrap().unwrap();
    record.version = Version::new(7);
    record.quantity_available = 1;

    assert!(matches!(
        tx.update_stock(&record).await,
        Err(StoreError::Conflict { .. })
    ));
}

#[tokio::test]
#[serial]
async fn order_round_trip_with_items() {
    let store = get_test_store().await;
    let order = new_order(vec![
        OrderLine::new("P1", 2, Money::from_cents(1250)),
        OrderLine::new("P2", 1, Money::from_major(3)),
    ]);

    let mut tx = store.begin().await.unwrap();
    let saved = tx.save_order(&order).await.unwrap();
    assert_eq!(saved.version, Version::first());
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Pending);
    assert_eq!(loaded.payment_status, PaymentStatus::Unpaid);
    assert_eq!(loaded.total_amount, Money::from_cents(2800));
    assert_eq!(loaded.notes.as_deref(), Some("fragile"));
    assert_eq!(loaded.items.len(), 2);
    assert_eq!(loaded.items[0].product_id, ProductId::new("P1"));
    assert_eq!(loaded.items[1].product_id, ProductId::new("P2"));
    assert_eq!(loaded.version, Version::first());
}

#[tokio::test]
#[serial]
async fn order_update_replaces_items() {
    let store = get_test_store().await;
    let order = new_order(vec![OrderLine::new("P1", 2, Money::from_major(1))]);

    let mut tx = store.begin().await.unwrap();
    let mut saved = tx.save_order(&order).await.unwrap();
    tx.commit().await.unwrap();

    saved
        .replace_items(&[OrderLine::new("P9", 5, Money::from_major(2))], Utc::now())
        .unwrap();
    let mut tx = store.begin().await.unwrap();
    let updated = tx.save_order(&saved).await.unwrap();
    assert_eq!(updated.version, Version::new(2));
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.items.len(), 1);
    assert_eq!(loaded.items[0].product_id, ProductId::new("P9"));
    assert_eq!(loaded.total_amount, Money::from_major(10));
}

#[tokio::test]
#[serial]
async fn stale_order_save_conflicts() {
    let store = get_test_store().await;
    let order = new_order(vec![OrderLine::new("P1", 1, Money::from_major(1))]);

    let mut tx = store.begin().await.unwrap();
    let saved = tx.save_order(&order).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.save_order(&saved).await.unwrap();
    tx.commit().await.unwrap();

    // `saved` still carries version 1.
    let mut tx = store.begin().await.unwrap();
    assert!(matches!(
        tx.save_order(&saved).await,
        Err(StoreError::Conflict { entity: "order", .. })
    ));
}

#[tokio::test]
#[serial]
async fn orders_by_user_and_status() {
    let store = get_test_store().await;
    let first = new_order(vec![OrderLine::new("P1", 1, Money::from_major(1))]);
    let mut second = first.clone();
    second.id = domain::OrderId::new();
    second.order_date = first.order_date + chrono::Duration::seconds(5);
    second.items.clear();
    second
        .replace_items(&[OrderLine::new("P2", 1, Money::from_major(1))], Utc::now())
        .unwrap();
    second
        .transition_to(OrderStatus::Processing, "confirm", Utc::now())
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.save_order(&first).await.unwrap();
    tx.save_order(&second).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let by_user = tx.find_orders_by_user(first.user_id).await.unwrap();
    assert_eq!(by_user.len(), 2);
    assert_eq!(by_user[0].id, second.id);
    assert_eq!(by_user[0].items.len(), 1);

    let processing = tx
        .find_orders_by_status(OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(processing.len(), 1);
    assert_eq!(processing[0].id, second.id);

    assert!(
        tx.find_orders_by_user(UserId::new())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[serial]
async fn delete_order_removes_items() {
    let store = get_test_store().await;
    let order = new_order(vec![OrderLine::new("P1", 1, Money::from_major(1))]);

    let mut tx = store.begin().await.unwrap();
    let saved = tx.save_order(&order).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.delete_order(&saved).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.find_order(order.id).await.unwrap().is_none());

    let (items,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM order_items")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(items, 0);
}

#[tokio::test]
#[serial]
async fn concurrent_reservations_never_oversell() {
    let store = get_test_store().await;
    seed_stock(&store, "P1", 5).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut tx = store.begin().await?;
            let outcome = tx
                .apply_movement(&ProductId::new("P1"), StockMovement::Reserve(2))
                .await?;
            tx.commit().await?;
            Ok::<_, StoreError>(outcome)
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if let Ok(MovementOutcome::Applied(_)) = handle.await.unwrap() {
            applied += 1;
        }
    }

    let remaining = stock_level(&store, "P1").await.unwrap();
    assert_eq!(remaining, 5 - 2 * applied);
    assert!(applied <= 2);
}
