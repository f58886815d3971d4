//! Order orchestrator: composes stock reservations with order persistence.
//!
//! Every workflow runs as one unit of work: it opens a transaction, performs
//! all of its reservations, releases and order writes inside it, and commits
//! only if every step succeeded. Any error rolls the whole transaction back,
//! so a partial reservation is never visible outside the call. Units of work
//! that lose a write race are retried from scratch.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use common::{OrderId, ProductId, UserId};
use domain::{CreateOrder, Order, OrderItem, OrderLine, OrderStatus, UpdateOrder};
use store::{OrderRepository, Store};

use crate::collaborators::{LookupError, ProductCatalog, User, UserDirectory};
use crate::config::FulfillmentConfig;
use crate::error::{FulfillmentError, Result};
use crate::inventory::InventoryCoordinator;
use crate::retry::retry_on_conflict;
use crate::transaction::finish;
use crate::view::{OrderItemView, OrderView, UNKNOWN_PRODUCT, UNKNOWN_USER};

/// Prefix of simulated gateway transaction ids that are declined.
pub const FAILING_TRANSACTION_PREFIX: &str = "FAIL-";

fn record_duration(operation: &'static str, started: Instant) {
    metrics::histogram!("order_workflow_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

async fn load_order<T: OrderRepository>(tx: &mut T, order_id: OrderId) -> Result<Order> {
    tx.find_order(order_id)
        .await?
        .ok_or_else(|| FulfillmentError::not_found("order", order_id))
}

fn lookup_failure(entity: &'static str, id: impl ToString, err: LookupError) -> FulfillmentError {
    match err {
        LookupError::NotFound => FulfillmentError::not_found(entity, id),
        LookupError::Unavailable(reason) => FulfillmentError::Unavailable(reason),
    }
}

/// Runs the order workflows.
pub struct OrderOrchestrator<S: Store, U, P> {
    store: S,
    inventory: InventoryCoordinator<S>,
    users: U,
    products: P,
    config: FulfillmentConfig,
}

impl<S, U, P> OrderOrchestrator<S, U, P>
where
    S: Store,
    U: UserDirectory,
    P: ProductCatalog,
{
    pub fn new(store: S, users: U, products: P, config: FulfillmentConfig) -> Self {
        let inventory = InventoryCoordinator::new(store.clone(), config.retry.clone());
        Self {
            store,
            inventory,
            users,
            products,
            config,
        }
    }

    /// The coordinator used for every stock change these workflows make.
    pub fn inventory(&self) -> &InventoryCoordinator<S> {
        &self.inventory
    }

    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }

    async fn require_user(&self, user_id: UserId) -> Result<User> {
        self.users
            .find_user(user_id)
            .await
            .map_err(|err| lookup_failure("user", user_id, err))
    }

    /// Every line must name an existing, active product.
    async fn require_active_products(&self, lines: &[OrderLine]) -> Result<()> {
        for line in lines {
            let product = self
                .products
                .find_product(&line.product_id)
                .await
                .map_err(|err| lookup_failure("product", &line.product_id, err))?;

            if !product.active {
                return Err(FulfillmentError::validation(format!(
                    "Product is not active: {}",
                    product.id
                )));
            }
        }
        Ok(())
    }

    /// Checks every line first, then reserves them in order.
    async fn allocate(&self, tx: &mut S::Tx, lines: &[OrderLine]) -> Result<()> {
        for line in lines {
            self.inventory
                .ensure_available_in(tx, &line.product_id, line.quantity)
                .await?;
        }
        for line in lines {
            self.inventory
                .reserve_in(tx, &line.product_id, line.quantity)
                .await?;
        }
        Ok(())
    }

    async fn release_items(&self, tx: &mut S::Tx, items: &[OrderItem]) -> Result<()> {
        for item in items {
            self.inventory
                .release_in(tx, &item.product_id, item.quantity)
                .await?;
        }
        Ok(())
    }

    async fn product_name(&self, product_id: &ProductId) -> String {
        match self.products.find_product(product_id).await {
            Ok(product) => product.name,
            Err(err) => {
                tracing::debug!(product_id = %product_id, error = %err, "product name unavailable");
                UNKNOWN_PRODUCT.to_string()
            }
        }
    }

    /// Resolves display names. Lookup failures degrade to placeholders.
    async fn materialize(&self, order: Order) -> OrderView {
        let user_name = match self.users.find_user(order.user_id).await {
            Ok(user) => user.display_name(),
            Err(err) => {
                tracing::debug!(user_id = %order.user_id, error = %err, "user name unavailable");
                UNKNOWN_USER.to_string()
            }
        };

        let mut names: HashMap<ProductId, String> = HashMap::new();
        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let name = match names.get(&item.product_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.product_name(&item.product_id).await;
                    names.insert(item.product_id.clone(), name.clone());
                    name
                }
            };
            items.push(OrderItemView::new(item, name));
        }

        OrderView::new(order, user_name, items)
    }

    async fn materialize_all(&self, orders: Vec<Order>) -> Vec<OrderView> {
        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            views.push(self.materialize(order).await);
        }
        views
    }

    /// Places a new order, reserving stock for every line.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id, items = cmd.items.len()))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<OrderView> {
        let started = Instant::now();

        self.require_user(cmd.user_id).await?;
        cmd.validate()?;
        self.require_active_products(&cmd.items).await?;

        let cmd = &cmd;
        let order = retry_on_conflict(&self.config.retry, "create_order", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome: Result<Order> = async {
                self.allocate(&mut tx, &cmd.items).await?;
                let order = Order::place(cmd, &self.config.default_payment_method, Utc::now())?;
                Ok(tx.save_order(&order).await?)
            }
            .await;
            finish(tx, outcome).await
        })
        .await?;

        metrics::counter!("orders_created_total").increment(1);
        record_duration("create_order", started);
        tracing::info!(
            order_id = %order.id,
            total = %order.total_amount,
            "order created"
        );

        Ok(self.materialize(order).await)
    }

    /// Records a payment and moves the order to `Processing`.
    #[tracing::instrument(skip(self))]
    pub async fn process_payment(
        &self,
        order_id: OrderId,
        transaction_id: Option<String>,
    ) -> Result<OrderView> {
        self.pay(order_id, transaction_id, false, "process_payment")
            .await
    }

    /// Like [`process_payment`](Self::process_payment), against a simulated
    /// gateway that declines transaction ids starting with
    /// [`FAILING_TRANSACTION_PREFIX`]. A declined payment leaves the order
    /// untouched.
    #[tracing::instrument(skip(self))]
    pub async fn simulate_payment(
        &self,
        order_id: OrderId,
        transaction_id: String,
    ) -> Result<OrderView> {
        let declined = transaction_id.starts_with(FAILING_TRANSACTION_PREFIX);
        self.pay(order_id, Some(transaction_id), declined, "simulate_payment")
            .await
    }

    async fn pay(
        &self,
        order_id: OrderId,
        transaction_id: Option<String>,
        declined: bool,
        operation: &'static str,
    ) -> Result<OrderView> {
        let started = Instant::now();
        let transaction_id = &transaction_id;

        let order = retry_on_conflict(&self.config.retry, operation, move || async move {
            let mut tx = self.store.begin().await?;
            let outcome: Result<Order> = async {
                let now = Utc::now();
                let mut order = load_order(&mut tx, order_id).await?;
                order.record_payment(transaction_id.clone(), now)?;
                order.transition_to(OrderStatus::Processing, "process payment", now)?;
                let saved = tx.save_order(&order).await?;

                if declined {
                    return Err(FulfillmentError::PaymentFailed {
                        order_id,
                        reason: format!(
                            "gateway declined transaction {}",
                            transaction_id.as_deref().unwrap_or_default()
                        ),
                    });
                }
                Ok(saved)
            }
            .await;
            finish(tx, outcome).await
        })
        .await
        .inspect_err(|err| {
            if let FulfillmentError::PaymentFailed { reason, .. } = err {
                tracing::warn!(order_id = %order_id, reason = %reason, "payment declined");
            }
        })?;

        metrics::counter!("order_status_transitions_total", "to" => order.status.as_str())
            .increment(1);
        record_duration(operation, started);
        tracing::info!(order_id = %order_id, status = %order.status, "payment recorded");

        Ok(self.materialize(order).await)
    }

    /// Moves the order to `status`. `Cancelled` runs the full cancellation
    /// workflow, releasing stock.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderView> {
        match status {
            OrderStatus::Cancelled => self.cancel_order(order_id).await,
            other => self.transition(order_id, other, "update status").await,
        }
    }

    /// `Pending` to `Processing`.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_order(&self, order_id: OrderId) -> Result<OrderView> {
        self.transition(order_id, OrderStatus::Processing, "confirm")
            .await
    }

    /// `Processing` to `Shipped`.
    #[tracing::instrument(skip(self))]
    pub async fn ship_order(&self, order_id: OrderId) -> Result<OrderView> {
        self.transition(order_id, OrderStatus::Shipped, "ship").await
    }

    /// `Shipped` to `Delivered`.
    #[tracing::instrument(skip(self))]
    pub async fn complete_order(&self, order_id: OrderId) -> Result<OrderView> {
        self.transition(order_id, OrderStatus::Delivered, "complete")
            .await
    }

    async fn transition(
        &self,
        order_id: OrderId,
        requested: OrderStatus,
        operation: &'static str,
    ) -> Result<OrderView> {
        let order = retry_on_conflict(&self.config.retry, operation, move || async move {
            let mut tx = self.store.begin().await?;
            let outcome: Result<Order> = async {
                let mut order = load_order(&mut tx, order_id).await?;
                order.transition_to(requested, operation, Utc::now())?;
                Ok(tx.save_order(&order).await?)
            }
            .await;
            finish(tx, outcome).await
        })
        .await?;

        metrics::counter!("order_status_transitions_total", "to" => requested.as_str())
            .increment(1);
        tracing::info!(order_id = %order_id, status = %requested, "order status changed");

        Ok(self.materialize(order).await)
    }

    /// Cancels a `Pending` or `Processing` order and releases its stock.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<OrderView> {
        let started = Instant::now();

        let order = retry_on_conflict(&self.config.retry, "cancel_order", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome: Result<Order> = async {
                let mut order = load_order(&mut tx, order_id).await?;
                order.transition_to(OrderStatus::Cancelled, "cancel", Utc::now())?;
                self.release_items(&mut tx, &order.items).await?;
                Ok(tx.save_order(&order).await?)
            }
            .await;
            finish(tx, outcome).await
        })
        .await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        metrics::counter!("order_status_transitions_total", "to" => OrderStatus::Cancelled.as_str())
            .increment(1);
        record_duration("cancel_order", started);
        tracing::info!(order_id = %order_id, items = order.item_count(), "order cancelled");

        Ok(self.materialize(order).await)
    }

    /// Amends a `Pending` order. New items replace the old allocation as a
    /// whole: the old lines are released and the new ones reserved in the same
    /// unit of work.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_order(&self, order_id: OrderId, update: UpdateOrder) -> Result<OrderView> {
        let started = Instant::now();

        update.validate()?;
        if let Some(lines) = &update.items {
            self.require_active_products(lines).await?;
        }

        let update = &update;
        let order = retry_on_conflict(&self.config.retry, "update_order", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome: Result<Order> = async {
                let now = Utc::now();
                let mut order = load_order(&mut tx, order_id).await?;
                order.ensure_editable("update")?;

                if let Some(lines) = &update.items {
                    self.release_items(&mut tx, &order.items).await?;
                    order.replace_items(lines, now)?;
                    self.allocate(&mut tx, lines).await?;
                }
                order.apply_details(update, now);

                Ok(tx.save_order(&order).await?)
            }
            .await;
            finish(tx, outcome).await
        })
        .await?;

        record_duration("update_order", started);
        tracing::info!(
            order_id = %order_id,
            items = order.item_count(),
            total = %order.total_amount,
            "order updated"
        );

        Ok(self.materialize(order).await)
    }

    /// Deletes a `Pending` order, releasing its stock.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        retry_on_conflict(&self.config.retry, "delete_order", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome: Result<()> = async {
                let order = load_order(&mut tx, order_id).await?;
                order.ensure_editable("delete")?;
                self.release_items(&mut tx, &order.items).await?;
                Ok(tx.delete_order(&order).await?)
            }
            .await;
            finish(tx, outcome).await
        })
        .await?;

        tracing::info!(order_id = %order_id, "order deleted");
        Ok(())
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderView> {
        let mut tx = self.store.begin().await?;
        let outcome = load_order(&mut tx, order_id).await;
        let order = finish(tx, outcome).await?;
        Ok(self.materialize(order).await)
    }

    /// Orders placed by `user_id`, newest first.
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderView>> {
        let mut tx = self.store.begin().await?;
        let outcome = tx
            .find_orders_by_user(user_id)
            .await
            .map_err(FulfillmentError::from);
        let orders = finish(tx, outcome).await?;
        Ok(self.materialize_all(orders).await)
    }

    /// Orders currently in `status`, newest first.
    pub async fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<OrderView>> {
        let mut tx = self.store.begin().await?;
        let outcome = tx
            .find_orders_by_status(status)
            .await
            .map_err(FulfillmentError::from);
        let orders = finish(tx, outcome).await?;
        Ok(self.materialize_all(orders).await)
    }
}
