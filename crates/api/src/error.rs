//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::FulfillmentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client (unparseable id, unknown status, ...).
    BadRequest(String),
    /// Error returned by an inventory or order workflow.
    Fulfillment(FulfillmentError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Fulfillment(err) => fulfillment_status(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::counter!("http_errors_total", "status" => status.as_u16().to_string())
            .increment(1);
        let message = match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Fulfillment(err) => {
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %err, "internal server error");
                }
                err.to_string()
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_status(err: &FulfillmentError) -> StatusCode {
    match err {
        FulfillmentError::NotFound { .. } => StatusCode::NOT_FOUND,
        FulfillmentError::Validation(_) => StatusCode::BAD_REQUEST,
        FulfillmentError::InsufficientStock { .. }
        | FulfillmentError::InvalidOrderState { .. }
        | FulfillmentError::AlreadyExists { .. }
        | FulfillmentError::Conflict(_) => StatusCode::CONFLICT,
        FulfillmentError::PaymentFailed { .. } => StatusCode::PAYMENT_REQUIRED,
        FulfillmentError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        FulfillmentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, ProductId};
    use domain::OrderStatus;
    use store::StoreError;

    use super::*;

    fn status_of(err: FulfillmentError) -> StatusCode {
        ApiError::from(err).status()
    }

    #[test]
    fn test_error_kinds_map_to_status_codes() {
        assert_eq!(
            status_of(FulfillmentError::not_found("Order", "x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(FulfillmentError::validation("bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(FulfillmentError::InsufficientStock {
                product_id: ProductId::new("P1"),
                requested: 2,
                available: 1,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(FulfillmentError::InvalidOrderState {
                order_id: OrderId::new(),
                current: OrderStatus::Shipped,
                operation: "cancel".to_string(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(FulfillmentError::Conflict("stock P1".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(FulfillmentError::PaymentFailed {
                order_id: OrderId::new(),
                reason: "declined".to_string(),
            }),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_of(FulfillmentError::Unavailable("offline".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(FulfillmentError::Store(StoreError::Corrupt("row".to_string()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_bad_request() {
        assert_eq!(
            ApiError::BadRequest("nope".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
