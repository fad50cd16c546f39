//! Payment webhook verification and reconciliation.
//!
//! The gateway reports payment outcomes asynchronously. Each delivery is
//! verified against the shared secret, mapped to an order by its gateway
//! reference, and then commits or releases that order's holds. Order status
//! changes are compare-and-set, so redelivered webhooks are no-ops.

use std::sync::Arc;

use domain::{Order, OrderStatus, PaymentStatus};
use hmac::{Hmac, Mac};
use inventory::{ReservationEngine, ReservationError};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use store::{InventoryStore, OrderStore};

use crate::error::ReconciliationError;

type HmacSha256 = Hmac<Sha256>;

/// Checks `HMAC-SHA256(secret, body)` signatures, hex encoded.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    /// Returns the hex signature the gateway would send for `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a hex signature against the raw body.
    pub fn verify(&self, body: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }
}

/// Webhook envelope as sent by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<Entity<PaymentEntity>>,
    pub order: Option<Entity<OrderEntity>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entity<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: Option<String>,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderEntity {
    pub id: String,
}

impl WebhookEvent {
    /// The gateway order the event is about, if it names one.
    pub fn gateway_order_reference(&self) -> Option<&str> {
        self.payload
            .payment
            .as_ref()
            .and_then(|p| p.entity.order_id.as_deref())
            .or_else(|| self.payload.order.as_ref().map(|o| o.entity.id.as_str()))
    }

    pub fn kind(&self) -> PaymentEventKind {
        match self.event.as_str() {
            "payment.captured" | "order.paid" => PaymentEventKind::Succeeded,
            "payment.failed" => PaymentEventKind::Failed,
            _ => PaymentEventKind::Other,
        }
    }
}

/// How a webhook event is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventKind {
    Succeeded,
    Failed,
    Other,
}

/// What processing a webhook did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Holds committed, order paid.
    Paid,
    /// Payment captured but the holds had lapsed and stock was gone.
    OnHold,
    /// Holds released, order marked payment failed.
    PaymentFailed,
    /// The order already reflects this event.
    AlreadyProcessed,
    /// Event type or order not handled here.
    Ignored,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Paid => "paid",
            ReconcileOutcome::OnHold => "on_hold",
            ReconcileOutcome::PaymentFailed => "payment_failed",
            ReconcileOutcome::AlreadyProcessed => "already_processed",
            ReconcileOutcome::Ignored => "ignored",
        }
    }
}

/// Applies verified payment outcomes to orders and their holds.
pub struct PaymentReconciler<S> {
    store: Arc<S>,
    engine: ReservationEngine<S>,
    verifier: WebhookVerifier,
}

impl<S> Clone for PaymentReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            engine: self.engine.clone(),
            verifier: self.verifier.clone(),
        }
    }
}

impl<S: InventoryStore + OrderStore> PaymentReconciler<S> {
    pub fn new(store: Arc<S>, engine: ReservationEngine<S>, verifier: WebhookVerifier) -> Self {
        Self {
            store,
            engine,
            verifier,
        }
    }

    /// Verifies, parses and applies one webhook delivery.
    ///
    /// The signature is checked before the body is parsed.
    #[tracing::instrument(skip(self, body, signature), fields(bytes = body.len()))]
    pub async fn handle(
        &self,
        body: &[u8],
        signature: &str,
    ) -> Result<ReconcileOutcome, ReconciliationError> {
        if !self.verifier.verify(body, signature) {
            metrics::counter!("webhook_rejected_total").increment(1);
            tracing::warn!("Webhook signature rejected");
            return Err(ReconciliationError::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| ReconciliationError::MalformedPayload(e.to_string()))?;
        metrics::counter!("webhook_received_total", "event" => event.event.clone()).increment(1);

        let outcome = self.apply(&event).await?;
        metrics::counter!("webhook_outcome_total", "outcome" => outcome.as_str()).increment(1);
        tracing::info!(event = %event.event, outcome = outcome.as_str(), "Webhook processed");
        Ok(outcome)
    }

    /// Applies an already verified event.
    pub async fn apply(&self, event: &WebhookEvent) -> Result<ReconcileOutcome, ReconciliationError> {
        let kind = event.kind();
        if kind == PaymentEventKind::Other {
            return Ok(ReconcileOutcome::Ignored);
        }
        let Some(reference) = event.gateway_order_reference() else {
            return Err(ReconciliationError::MalformedPayload(format!(
                "{} event without an order reference",
                event.event
            )));
        };
        let Some(order) = self.store.find_by_gateway_order(reference).await? else {
            tracing::info!(gateway_order = reference, "Webhook for unknown gateway order ignored");
            return Ok(ReconcileOutcome::Ignored);
        };

        match kind {
            PaymentEventKind::Succeeded => self.payment_succeeded(&order).await,
            PaymentEventKind::Failed => self.payment_failed(&order).await,
            PaymentEventKind::Other => Ok(ReconcileOutcome::Ignored),
        }
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    async fn payment_succeeded(&self, order: &Order) -> Result<ReconcileOutcome, ReconciliationError> {
        match order.status {
            OrderStatus::PaymentPending => {}
            OrderStatus::Paid
            | OrderStatus::OnHold
            | OrderStatus::Processing
            | OrderStatus::Shipped
            | OrderStatus::Delivered => return Ok(ReconcileOutcome::AlreadyProcessed),
            status => {
                metrics::counter!("webhook_capture_on_closed_order_total").increment(1);
                tracing::error!(%status, "Payment captured for an order that is no longer payable");
                return Ok(ReconcileOutcome::Ignored);
            }
        }

        let (next, outcome) = match self.engine.commit(order.id).await {
            Ok(committed) if committed.is_empty() => {
                metrics::counter!("orders_on_hold_total").increment(1);
                tracing::error!("Payment captured for an order without stock holds; order needs manual action");
                (OrderStatus::OnHold, ReconcileOutcome::OnHold)
            }
            Ok(_) => (OrderStatus::Paid, ReconcileOutcome::Paid),
            Err(ReservationError::HoldLapsed { variants, .. }) => {
                metrics::counter!("orders_on_hold_total").increment(1);
                tracing::error!(
                    variants = ?variants,
                    "Payment captured but holds lapsed and stock is gone; order needs manual action"
                );
                (OrderStatus::OnHold, ReconcileOutcome::OnHold)
            }
            Err(e) => return Err(e.into()),
        };

        let moved = self
            .store
            .transition_order(order.id, OrderStatus::PaymentPending, next, PaymentStatus::Paid)
            .await?;
        Ok(if moved {
            outcome
        } else {
            ReconcileOutcome::AlreadyProcessed
        })
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    async fn payment_failed(&self, order: &Order) -> Result<ReconcileOutcome, ReconciliationError> {
        match order.status {
            OrderStatus::PaymentPending => {}
            OrderStatus::PaymentFailed => return Ok(ReconcileOutcome::AlreadyProcessed),
            status => {
                tracing::warn!(%status, "Payment failure for an order past payment ignored");
                return Ok(ReconcileOutcome::Ignored);
            }
        }

        self.engine.release(order.id).await?;
        let moved = self
            .store
            .transition_order(
                order.id,
                OrderStatus::PaymentPending,
                OrderStatus::PaymentFailed,
                PaymentStatus::Failed,
            )
            .await?;
        Ok(if moved {
            ReconcileOutcome::PaymentFailed
        } else {
            ReconcileOutcome::AlreadyProcessed
        })
    }
}
