//! Order lifecycle state machine.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Created ──► PaymentPending ──┬──► Paid ──► Processing ──► Shipped ──► Delivered
///    │              │          ├──► PaymentFailed
///    │              │          └──► OnHold ──► Paid
///    └──────────────┴──────────────────► Cancelled
/// ```
///
/// `Paid`, `Processing` and `OnHold` can also be cancelled administratively.
///
/// Checkout and reconciliation only move orders as far as `Paid`, `OnHold`,
/// `PaymentFailed` or `Cancelled`. Settling an `OnHold` order (restock, then
/// `Paid`; or refund, then `Cancelled`) and every fulfilment step after `Paid`
/// are back-office actions validated by [`OrderStatus::ensure_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Draft written by checkout, not yet payable.
    #[default]
    Created,

    /// Gateway order exists, waiting for the buyer to pay.
    PaymentPending,

    /// Payment confirmed and stock committed.
    Paid,

    /// Being packed.
    Processing,

    /// Handed to the carrier.
    Shipped,

    /// Received by the buyer (terminal state).
    Delivered,

    /// Payment captured but the stock hold had lapsed and could not be re-confirmed.
    OnHold,

    /// Gateway reported a failed payment (terminal state).
    PaymentFailed,

    /// Cancelled by the buyer or an administrator (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order may move from this status to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Created, PaymentPending)
                | (Created, Cancelled)
                | (PaymentPending, Paid)
                | (PaymentPending, PaymentFailed)
                | (PaymentPending, OnHold)
                | (PaymentPending, Cancelled)
                | (OnHold, Paid)
                | (OnHold, Cancelled)
                | (Paid, Processing)
                | (Paid, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Returns an error unless the transition to `next` is allowed.
    pub fn ensure_transition(&self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::InvalidOrderTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::PaymentFailed | OrderStatus::Cancelled
        )
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::PaymentPending => "payment_pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::OnHold => "on_hold",
            OrderStatus::PaymentFailed => "payment_failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "created" => OrderStatus::Created,
            "payment_pending" => OrderStatus::PaymentPending,
            "paid" => OrderStatus::Paid,
            "processing" => OrderStatus::Processing,
            "shipped" => OrderStatus::Shipped,
            "delivered" => OrderStatus::Delivered,
            "on_hold" => OrderStatus::OnHold,
            "payment_failed" => OrderStatus::PaymentFailed,
            "cancelled" => OrderStatus::Cancelled,
            other => {
                return Err(DomainError::UnknownValue {
                    kind: "order status",
                    value: other.to_string(),
                });
            }
        })
    }
}

/// Settlement state of the order's payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::UnknownValue {
                kind: "payment status",
                value: other.to_string(),
            }),
        }
    }
}
