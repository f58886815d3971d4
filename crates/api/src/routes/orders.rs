//! Order workflow endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{CreateOrder, Money, OrderLine, OrderStatus, UpdateOrder};
use fulfillment::{OrderView, ProductCatalog, UserDirectory};
use serde::Deserialize;
use store::Store;

use super::{AppState, parse_order_id, parse_user_id};
use crate::error::ApiError;

type Orders<S, U, P> = State<Arc<AppState<S, U, P>>>;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub shipping_address: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<OrderLineRequest>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl From<OrderLineRequest> for OrderLine {
    fn from(req: OrderLineRequest) -> Self {
        OrderLine::new(
            req.product_id,
            req.quantity,
            Money::from_cents(req.unit_price_cents),
        )
    }
}

#[derive(Deserialize, Default)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<OrderLineRequest>>,
}

#[derive(Deserialize)]
pub struct PaymentRequest {
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SimulatedPaymentRequest {
    pub transaction_id: String,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// Exactly one of the filters must be given.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<String>,
    pub status: Option<String>,
}

fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    raw.parse().map_err(ApiError::BadRequest)
}

// -- Handlers --

/// POST /orders: validate, reserve stock and persist a new order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, U, P>(
    State(state): Orders<S, U, P>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>), ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let user_id = parse_user_id(&req.user_id)?;
    let items = req.items.into_iter().map(OrderLine::from).collect();

    let mut cmd = CreateOrder::new(user_id, req.shipping_address, items);
    if let Some(method) = req.payment_method {
        cmd = cmd.with_payment_method(method);
    }
    if let Some(notes) = req.notes {
        cmd = cmd.with_notes(notes);
    }

    let view = state.orchestrator.create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /orders?user_id=… or GET /orders?status=…
#[tracing::instrument(skip(state))]
pub async fn list<S, U, P>(
    State(state): Orders<S, U, P>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderView>>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let views = match (query.user_id, query.status) {
        (Some(user_id), None) => {
            let user_id = parse_user_id(&user_id)?;
            state.orchestrator.orders_for_user(user_id).await?
        }
        (None, Some(status)) => {
            let status = parse_status(&status)?;
            state.orchestrator.orders_by_status(status).await?
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Specify exactly one of user_id or status".to_string(),
            ));
        }
    };
    Ok(Json(views))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S, U, P>(
    State(state): Orders<S, U, P>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.orchestrator.get_order(order_id).await?))
}

/// PUT /orders/{id}: amend a pending order, re-reserving when items change.
#[tracing::instrument(skip(state, req))]
pub async fn update<S, U, P>(
    State(state): Orders<S, U, P>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<OrderView>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let order_id = parse_order_id(&id)?;
    let update = UpdateOrder {
        shipping_address: req.shipping_address,
        payment_method: req.payment_method,
        notes: req.notes,
        items: req
            .items
            .map(|items| items.into_iter().map(OrderLine::from).collect()),
    };
    Ok(Json(state.orchestrator.update_order(order_id, update).await?))
}

/// DELETE /orders/{id}: remove a pending order and release its stock.
#[tracing::instrument(skip(state))]
pub async fn delete<S, U, P>(
    State(state): Orders<S, U, P>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let order_id = parse_order_id(&id)?;
    state.orchestrator.delete_order(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /orders/{id}/payment
#[tracing::instrument(skip(state, req))]
pub async fn pay<S, U, P>(
    State(state): Orders<S, U, P>,
    Path(id): Path<String>,
    req: Option<Json<PaymentRequest>>,
) -> Result<Json<OrderView>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let order_id = parse_order_id(&id)?;
    let transaction_id = req.and_then(|Json(req)| req.transaction_id);
    Ok(Json(
        state
            .orchestrator
            .process_payment(order_id, transaction_id)
            .await?,
    ))
}

/// POST /orders/{id}/simulate-payment: transaction ids starting with
/// `FAIL-` are declined.
#[tracing::instrument(skip(state, req))]
pub async fn simulate_payment<S, U, P>(
    State(state): Orders<S, U, P>,
    Path(id): Path<String>,
    Json(req): Json<SimulatedPaymentRequest>,
) -> Result<Json<OrderView>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let order_id = parse_order_id(&id)?;
    Ok(Json(
        state
            .orchestrator
            .simulate_payment(order_id, req.transaction_id)
            .await?,
    ))
}

/// PUT /orders/{id}/status
#[tracing::instrument(skip(state, req))]
pub async fn set_status<S, U, P>(
    State(state): Orders<S, U, P>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<OrderView>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let order_id = parse_order_id(&id)?;
    let status = parse_status(&req.status)?;
    Ok(Json(
        state
            .orchestrator
            .update_order_status(order_id, status)
            .await?,
    ))
}

/// POST /orders/{id}/confirm
#[tracing::instrument(skip(state))]
pub async fn confirm<S, U, P>(
    State(state): Orders<S, U, P>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.orchestrator.confirm_order(order_id).await?))
}

/// POST /orders/{id}/ship
#[tracing::instrument(skip(state))]
pub async fn ship<S, U, P>(
    State(state): Orders<S, U, P>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.orchestrator.ship_order(order_id).await?))
}

/// POST /orders/{id}/complete
#[tracing::instrument(skip(state))]
pub async fn complete<S, U, P>(
    State(state): Orders<S, U, P>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.orchestrator.complete_order(order_id).await?))
}

/// POST /orders/{id}/cancel: cancel and return reserved stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<S, U, P>(
    State(state): Orders<S, U, P>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    S: Store,
    U: UserDirectory + 'static,
    P: ProductCatalog + 'static,
{
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.orchestrator.cancel_order(order_id).await?))
}
