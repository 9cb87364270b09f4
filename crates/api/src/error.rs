//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body could not be read as a checkout request.
    #[error("{0}")]
    BadRequest(String),
    /// Checkout run failure.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg, "kind": "malformed_body" }),
            ),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": msg }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, serde_json::Value) {
    let status = match &err {
        CheckoutError::Validation(_) => StatusCode::BAD_REQUEST,
        CheckoutError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        CheckoutError::PaymentFailure { .. } => StatusCode::PAYMENT_REQUIRED,
        CheckoutError::PartialFailure { .. } | CheckoutError::PaymentUnconfirmed { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        CheckoutError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };

    let mut body = serde_json::json!({
        "error": err.to_string(),
        "kind": err.kind(),
    });
    match &err {
        CheckoutError::PaymentFailure { order_id, .. }
        | CheckoutError::PaymentUnconfirmed { order_id, .. }
        | CheckoutError::Cancelled {
            order_id: Some(order_id),
            ..
        } => {
            body["order_id"] = order_id.as_str().into();
        }
        CheckoutError::PartialFailure {
            order_id,
            transaction_id,
            ..
        } => {
            body["order_id"] = order_id.as_str().into();
            body["transaction_id"] = transaction_id.as_str().into();
        }
        _ => {}
    }

    (status, body)
}
