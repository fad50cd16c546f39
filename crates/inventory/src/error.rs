//! Reservation error types.

use common::{OrderId, VariantId};
use domain::Shortage;
use store::StoreError;
use thiserror::Error;

/// Errors returned by the availability service, the reservation engine and
/// the reaper.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// The request itself is malformed. Nothing was read or written.
    #[error("Invalid reservation request: {0}")]
    InvalidRequest(String),

    /// One or more variants cannot cover the requested quantity.
    #[error("Insufficient stock: {}", describe(.0))]
    OutOfStock(Vec<Shortage>),

    /// The order already holds an active reservation for the variant.
    #[error("Order {order_id} already holds stock for variant {variant_id}")]
    DuplicateReservation {
        order_id: OrderId,
        variant_id: VariantId,
    },

    /// The order's holds lapsed and the stock is gone.
    #[error("Stock hold for order {order_id} lapsed before commit")]
    HoldLapsed {
        order_id: OrderId,
        variants: Vec<VariantId>,
    },

    /// Any other store failure.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl ReservationError {
    /// Returns the machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ReservationError::InvalidRequest(_) => "INVALID_REQUEST",
            ReservationError::OutOfStock(_) => "OUT_OF_STOCK",
            ReservationError::DuplicateReservation { .. } => "DUPLICATE_RESERVATION",
            ReservationError::HoldLapsed { .. } => "HOLD_LAPSED",
            ReservationError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OutOfStock(shortages) => ReservationError::OutOfStock(shortages),
            StoreError::DuplicateReservation {
                order_id,
                variant_id,
            } => ReservationError::DuplicateReservation {
                order_id,
                variant_id,
            },
            StoreError::HoldLapsed { order_id, variants } => {
                ReservationError::HoldLapsed { order_id, variants }
            }
            other => ReservationError::Store(other),
        }
    }
}

fn describe(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience type alias for reservation results.
pub type Result<T> = std::result::Result<T, ReservationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_keep_their_meaning() {
        let order_id = OrderId::new();
        let err: ReservationError = StoreError::HoldLapsed {
            order_id,
            variants: vec![],
        }
        .into();
        assert_eq!(err.code(), "HOLD_LAPSED");

        let err: ReservationError = StoreError::OrderNotFound(order_id).into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn out_of_stock_message_is_specific() {
        let variant_id = VariantId::new();
        let err = ReservationError::OutOfStock(vec![Shortage {
            variant_id,
            requested: 2,
            available: 1,
        }]);
        assert_eq!(
            err.to_string(),
            format!("Insufficient stock: only 1 left of variant {variant_id} (requested 2)")
        );
    }
}
