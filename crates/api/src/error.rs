//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, ReconciliationError};
use inventory::ReservationError;
use serde::Serialize;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid credentials.
    Unauthorized(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout or buyer order action failed.
    Checkout(CheckoutError),
    /// Availability or reaper failure.
    Reservation(ReservationError),
    /// Webhook could not be verified or applied.
    Webhook(ReconciliationError),
}

/// Structured error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error_code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    fn new(error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            error_code,
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let (status, body) = match self {
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorBody::new("UNAUTHORIZED", msg))
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("VALIDATION_FAILED", msg),
            ),
            ApiError::Checkout(err) => {
                if let CheckoutError::RateLimited { retry_after: after } = &err {
                    retry_after = Some(after.as_secs().max(1));
                }
                checkout_error_to_response(err)
            }
            ApiError::Reservation(err) => reservation_error_to_response(err),
            ApiError::Webhook(err) => webhook_error_to_response(err),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

fn internal(err: &dyn std::fmt::Display) -> (StatusCode, ErrorBody) {
    tracing::error!(error = %err, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorBody::new("INTERNAL_ERROR", "Something went wrong, please try again"),
    )
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, ErrorBody) {
    let status = match &err {
        CheckoutError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        CheckoutError::Validation(_) => StatusCode::BAD_REQUEST,
        CheckoutError::OutOfStock(_) | CheckoutError::InvalidOrderState { .. } => {
            StatusCode::CONFLICT
        }
        CheckoutError::PaymentInit(_) => StatusCode::BAD_GATEWAY,
        CheckoutError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        CheckoutError::Unavailable(_)
        | CheckoutError::Reservation(_)
        | CheckoutError::Store(_)
        | CheckoutError::Domain(_) => return internal(&err),
    };

    let details = match &err {
        CheckoutError::OutOfStock(shortages) => {
            Some(serde_json::json!({ "variants": shortages }))
        }
        CheckoutError::RateLimited { retry_after } => {
            Some(serde_json::json!({ "retry_after_secs": retry_after.as_secs().max(1) }))
        }
        CheckoutError::InvalidOrderState { status } => {
            Some(serde_json::json!({ "status": status }))
        }
        _ => None,
    };

    (
        status,
        ErrorBody {
            error_code: err.code(),
            message: err.to_string(),
            details,
        },
    )
}

fn reservation_error_to_response(err: ReservationError) -> (StatusCode, ErrorBody) {
    match &err {
        ReservationError::InvalidRequest(msg) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new(err.code(), msg.clone()),
        ),
        _ => internal(&err),
    }
}

fn webhook_error_to_response(err: ReconciliationError) -> (StatusCode, ErrorBody) {
    match &err {
        ReconciliationError::InvalidSignature => (
            StatusCode::UNAUTHORIZED,
            ErrorBody::new("INVALID_SIGNATURE", err.to_string()),
        ),
        ReconciliationError::MalformedPayload(_) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("MALFORMED_PAYLOAD", err.to_string()),
        ),
        ReconciliationError::Reservation(_) | ReconciliationError::Store(_) => internal(&err),
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<ReservationError> for ApiError {
    fn from(err: ReservationError) -> Self {
        ApiError::Reservation(err)
    }
}

impl From<ReconciliationError> for ApiError {
    fn from(err: ReconciliationError) -> Self {
        ApiError::Webhook(err)
    }
}
