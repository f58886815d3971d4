//! HTTP API server for order fulfillment and inventory.
//!
//! Provides REST endpoints for the order workflows and the stock ledger,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod demo;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use fulfillment::{
    FulfillmentConfig, InMemoryProductCatalog, InMemoryUserDirectory, OrderOrchestrator,
    ProductCatalog, UserDirectory,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// State wired to the in-memory user directory and product catalog.
pub type DefaultState<S> = Arc<AppState<S, InMemoryUserDirectory, InMemoryProductCatalog>>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, U, P>(state: Arc<AppState<S, U, P>>, metrics_handle: PrometheusHandle) -> Router
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    use routes::{inventory, orders};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route(
            "/orders",
            post(orders::create::<S, U, P>).get(orders::list::<S, U, P>),
        )
        .route(
            "/orders/{id}",
            get(orders::get::<S, U, P>)
                .put(orders::update::<S, U, P>)
                .delete(orders::delete::<S, U, P>),
        )
        .route("/orders/{id}/payment", post(orders::pay::<S, U, P>))
        .route(
            "/orders/{id}/simulate-payment",
            post(orders::simulate_payment::<S, U, P>),
        )
        .route("/orders/{id}/status", put(orders::set_status::<S, U, P>))
        .route("/orders/{id}/confirm", post(orders::confirm::<S, U, P>))
        .route("/orders/{id}/ship", post(orders::ship::<S, U, P>))
        .route("/orders/{id}/complete", post(orders::complete::<S, U, P>))
        .route("/orders/{id}/cancel", post(orders::cancel::<S, U, P>))
        .route(
            "/inventory",
            post(inventory::create::<S, U, P>).get(inventory::list::<S, U, P>),
        )
        .route("/inventory/low", get(inventory::low::<S, U, P>))
        .route(
            "/inventory/out-of-stock",
            get(inventory::out_of_stock::<S, U, P>),
        )
        .route(
            "/inventory/{product_id}",
            get(inventory::get::<S, U, P>).put(inventory::set::<S, U, P>),
        )
        .route(
            "/inventory/{product_id}/availability",
            get(inventory::availability::<S, U, P>),
        )
        .route("/inventory/{product_id}/add", post(inventory::add::<S, U, P>))
        .route(
            "/inventory/{product_id}/remove",
            post(inventory::remove::<S, U, P>),
        )
        .route(
            "/inventory/{product_id}/reserve",
            post(inventory::reserve::<S, U, P>),
        )
        .route(
            "/inventory/{product_id}/release",
            post(inventory::release::<S, U, P>),
        )
        .route(
            "/inventory/{product_id}/reorder-level",
            put(inventory::set_reorder_level::<S, U, P>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state backed by `store` and in-memory user and
/// product collaborators, returning the collaborators so callers can fill them.
pub fn create_default_state<S: Store>(
    store: S,
    config: FulfillmentConfig,
) -> (DefaultState<S>, InMemoryUserDirectory, InMemoryProductCatalog) {
    let users = InMemoryUserDirectory::new();
    let products = InMemoryProductCatalog::new();
    let orchestrator = OrderOrchestrator::new(store, users.clone(), products.clone(), config);

    (Arc::new(AppState::new(orchestrator)), users, products)
}
