//! Stock ledger endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::ProductId;
use domain::StockRecord;
use fulfillment::{ProductCatalog, UserDirectory};
use serde::{Deserialize, Serialize};
use store::Store;

use super::AppState;
use crate::error::ApiError;

type Inventory<S, U, P> = State<Arc<AppState<S, U, P>>>;

#[derive(Deserialize)]
pub struct CreateStockRequest {
    pub product_id: String,
    pub initial_quantity: u32,
    /// 0 or absent selects the default reorder level.
    #[serde(default)]
    pub reorder_level: u32,
    #[serde(default)]
    pub warehouse_location: Option<String>,
}

#[derive(Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct ReorderLevelRequest {
    pub reorder_level: u32,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Comma-separated product ids; all records when absent.
    pub product_ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub product_id: ProductId,
    pub quantity: u32,
    pub available: bool,
    pub in_stock: bool,
}

/// POST /inventory
#[tracing::instrument(skip(state, req))]
pub async fn create<S, U, P>(
    State(state): Inventory<S, U, P>,
    Json(req): Json<CreateStockRequest>,
) -> Result<(StatusCode, Json<StockRecord>), ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let record = state
        .inventory()
        .create_stock(
            &ProductId::new(req.product_id),
            req.initial_quantity,
            req.reorder_level,
            req.warehouse_location,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /inventory or GET /inventory?product_ids=A,B
#[tracing::instrument(skip(state))]
pub async fn list<S, U, P>(
    State(state): Inventory<S, U, P>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StockRecord>>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let records = match query.product_ids {
        Some(raw) => {
            let ids: Vec<ProductId> = raw
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(ProductId::from)
                .collect();
            state.inventory().stock_for_products(&ids).await?
        }
        None => state.inventory().all_stock().await?,
    };
    Ok(Json(records))
}

/// GET /inventory/low: records at or below their reorder level.
#[tracing::instrument(skip(state))]
pub async fn low<S, U, P>(
    State(state): Inventory<S, U, P>,
) -> Result<Json<Vec<StockRecord>>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    Ok(Json(state.inventory().low_stock().await?))
}

/// GET /inventory/out-of-stock
#[tracing::instrument(skip(state))]
pub async fn out_of_stock<S, U, P>(
    State(state): Inventory<S, U, P>,
) -> Result<Json<Vec<StockRecord>>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    Ok(Json(state.inventory().out_of_stock().await?))
}

/// GET /inventory/{product_id}
#[tracing::instrument(skip(state))]
pub async fn get<S, U, P>(
    State(state): Inventory<S, U, P>,
    Path(product_id): Path<String>,
) -> Result<Json<StockRecord>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    Ok(Json(
        state.inventory().get_stock(&ProductId::new(product_id)).await?,
    ))
}

/// GET /inventory/{product_id}/availability?quantity=N
///
/// A missing record reads as unavailable and out of stock.
#[tracing::instrument(skip(state))]
pub async fn availability<S, U, P>(
    State(state): Inventory<S, U, P>,
    Path(product_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let product_id = ProductId::new(product_id);
    let inventory = state.inventory();
    let available = inventory
        .has_available_stock(&product_id, query.quantity)
        .await;
    let in_stock = inventory.is_in_stock(&product_id).await?;

    Ok(Json(AvailabilityResponse {
        product_id,
        quantity: query.quantity,
        available,
        in_stock,
    }))
}

/// POST /inventory/{product_id}/add: restock.
#[tracing::instrument(skip(state, req))]
pub async fn add<S, U, P>(
    State(state): Inventory<S, U, P>,
    Path(product_id): Path<String>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<StockRecord>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let product_id = ProductId::new(product_id);
    Ok(Json(
        state.inventory().add_stock(&product_id, req.quantity).await?,
    ))
}

/// POST /inventory/{product_id}/remove: shrinkage or write-off.
#[tracing::instrument(skip(state, req))]
pub async fn remove<S, U, P>(
    State(state): Inventory<S, U, P>,
    Path(product_id): Path<String>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<StockRecord>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let product_id = ProductId::new(product_id);
    Ok(Json(
        state
            .inventory()
            .remove_stock(&product_id, req.quantity)
            .await?,
    ))
}

/// POST /inventory/{product_id}/reserve
#[tracing::instrument(skip(state, req))]
pub async fn reserve<S, U, P>(
    State(state): Inventory<S, U, P>,
    Path(product_id): Path<String>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<StockRecord>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let product_id = ProductId::new(product_id);
    Ok(Json(
        state
            .inventory()
            .reserve_stock(&product_id, req.quantity)
            .await?,
    ))
}

/// POST /inventory/{product_id}/release
#[tracing::instrument(skip(state, req))]
pub async fn release<S, U, P>(
    State(state): Inventory<S, U, P>,
    Path(product_id): Path<String>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<StockRecord>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let product_id = ProductId::new(product_id);
    Ok(Json(
        state
            .inventory()
            .release_stock(&product_id, req.quantity)
            .await?,
    ))
}

/// PUT /inventory/{product_id}: administrative absolute correction.
#[tracing::instrument(skip(state, req))]
pub async fn set<S, U, P>(
    State(state): Inventory<S, U, P>,
    Path(product_id): Path<String>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<StockRecord>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let product_id = ProductId::new(product_id);
    Ok(Json(
        state.inventory().set_stock(&product_id, req.quantity).await?,
    ))
}

/// PUT /inventory/{product_id}/reorder-level
#[tracing::instrument(skip(state, req))]
pub async fn set_reorder_level<S, U, P>(
    State(state): Inventory<S, U, P>,
    Path(product_id): Path<String>,
    Json(req): Json<ReorderLevelRequest>,
) -> Result<Json<StockRecord>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let product_id = ProductId::new(product_id);
    Ok(Json(
        state
            .inventory()
            .update_reorder_level(&product_id, req.reorder_level)
            .await?,
    ))
}
