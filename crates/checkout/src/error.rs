//! Checkout and reconciliation error types.

use std::time::Duration;

use common::OrderId;
use domain::{DomainError, OrderStatus, Shortage};
use inventory::ReservationError;
use store::StoreError;
use thiserror::Error;

/// Errors returned by the checkout orchestrator and buyer order actions.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Too many checkout attempts by this user.
    #[error("Too many checkout attempts, retry in {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// The request or cart is not acceptable. Nothing was written.
    #[error("{0}")]
    Validation(String),

    /// Stock is short for one or more variants. Nothing was held.
    #[error("{}", describe(.0))]
    OutOfStock(Vec<Shortage>),

    /// The payment gateway could not create a payable order. The checkout
    /// was rolled back.
    #[error("Could not start payment: {0}")]
    PaymentInit(String),

    /// The order does not exist or is not visible to the caller.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order is not in a status that allows the action.
    #[error("Order is {status}, which does not allow this action")]
    InvalidOrderState { status: OrderStatus },

    /// A collaborator the checkout cannot proceed without did not answer.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Reservation failure other than a stock shortage.
    #[error("Reservation error: {0}")]
    Reservation(ReservationError),

    /// Store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Domain rule violated.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl CheckoutError {
    /// Returns the machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::RateLimited { .. } => "RATE_LIMITED",
            CheckoutError::Validation(_) => "VALIDATION_FAILED",
            CheckoutError::OutOfStock(_) => "OUT_OF_STOCK",
            CheckoutError::PaymentInit(_) => "PAYMENT_INIT_FAILED",
            CheckoutError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            CheckoutError::InvalidOrderState { .. } => "INVALID_ORDER_STATE",
            CheckoutError::Unavailable(_)
            | CheckoutError::Reservation(_)
            | CheckoutError::Store(_)
            | CheckoutError::Domain(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ReservationError> for CheckoutError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::OutOfStock(shortages) => CheckoutError::OutOfStock(shortages),
            ReservationError::InvalidRequest(msg) => CheckoutError::Validation(msg),
            other => CheckoutError::Reservation(other),
        }
    }
}

/// Errors returned while processing a payment webhook.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// Signature missing or does not match the body.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// The body is not a webhook we can read.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("Reservation error: {0}")]
    Reservation(#[from] ReservationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

fn describe(shortages: &[Shortage]) -> String {
    let parts: Vec<String> = shortages
        .iter()
        .map(|s| {
            let text = s.to_string();
            let mut chars = text.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => text,
            }
        })
        .collect();
    parts.join("; ")
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::VariantId;

    #[test]
    fn test_out_of_stock_message_names_variant() {
        let variant_id = VariantId::new();
        let err = CheckoutError::OutOfStock(vec![Shortage {
            variant_id,
            requested: 2,
            available: 1,
        }]);
        assert_eq!(err.code(), "OUT_OF_STOCK");
        assert_eq!(
            err.to_string(),
            format!("Only 1 left of variant {variant_id} (requested 2)")
        );
    }

    #[test]
    fn test_reservation_errors_map_to_codes() {
        let err: CheckoutError = ReservationError::InvalidRequest("empty".into()).into();
        assert_eq!(err.code(), "VALIDATION_FAILED");

        let err: CheckoutError = ReservationError::HoldLapsed {
            order_id: OrderId::new(),
            variants: vec![],
        }
        .into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
