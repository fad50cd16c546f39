//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;
use crate::reservation::ReservationStatus;

/// Errors raised by domain rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// An order cannot move between the two statuses.
    #[error("Invalid order transition: cannot move from {from} to {to}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },

    /// A reservation cannot move between the two statuses.
    #[error("Invalid reservation transition: cannot move from {from} to {to}")]
    InvalidReservationTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    /// A stored or submitted value does not name a known variant of an enum.
    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },
}
