//! Checkout saga instance.

use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::CheckoutEvent;
use crate::state::CheckoutState;

/// One checkout attempt, rebuilt from its events.
///
/// The orchestrator records every event through [`CheckoutSaga::record`],
/// which applies it and keeps it in the log. Compensation reads
/// `completed_steps` to know what has to be undone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSaga {
    id: Option<Uuid>,
    user_id: Option<UserId>,
    order_id: Option<OrderId>,
    gateway_order_id: Option<String>,
    state: CheckoutState,
    current_step: usize,
    completed_steps: Vec<String>,
    failed_step: Option<String>,
    failure_reason: Option<String>,
    log: Vec<CheckoutEvent>,
}

impl CheckoutSaga {
    /// Applies `event` if the current state allows it.
    ///
    /// Returns false, leaving the saga untouched, for an out-of-order event.
    pub fn apply(&mut self, event: &CheckoutEvent) -> bool {
        let Some(next) = self.state.on(event) else {
            return false;
        };
        self.state = next;

        match event {
            CheckoutEvent::CheckoutStarted(data) => {
                self.id = Some(data.checkout_id);
                self.user_id = Some(data.user_id);
            }
            CheckoutEvent::StepStarted(_) => {
                self.current_step += 1;
            }
            CheckoutEvent::StepCompleted(data) => {
                self.completed_steps.push(data.step_name.clone());
                if let Some(order_id) = data.order_id {
                    self.order_id = Some(order_id);
                }
                if let Some(reference) = &data.gateway_order_id {
                    self.gateway_order_id = Some(reference.clone());
                }
            }
            CheckoutEvent::StepFailed(data) => {
                self.failed_step = Some(data.step_name.clone());
                self.failure_reason = Some(data.error.clone());
            }
            CheckoutEvent::CompensationStarted(_)
            | CheckoutEvent::CompensationStepCompleted(_)
            | CheckoutEvent::CompensationStepFailed(_)
            | CheckoutEvent::CheckoutCompleted(_) => {}
            CheckoutEvent::CheckoutFailed(data) => {
                if self.failure_reason.is_none() {
                    self.failure_reason = Some(data.reason.clone());
                }
            }
        }
        true
    }

    /// Applies the event, appends it to the log and traces it.
    pub fn record(&mut self, event: CheckoutEvent) {
        match &event {
            CheckoutEvent::StepFailed(data) | CheckoutEvent::CompensationStepFailed(data) => {
                tracing::warn!(
                    checkout_id = ?self.id,
                    event = event.event_type(),
                    step = %data.step_name,
                    error = %data.error,
                    "checkout event"
                );
            }
            _ => {
                tracing::debug!(
                    checkout_id = ?self.id,
                    event = event.event_type(),
                    "checkout event"
                );
            }
        }
        if !self.apply(&event) {
            tracing::error!(
                checkout_id = ?self.id,
                state = %self.state,
                event = event.event_type(),
                "checkout event out of order, dropped"
            );
            return;
        }
        self.log.push(event);
    }
}

// Query methods
impl CheckoutSaga {
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn gateway_order_id(&self) -> Option<&str> {
        self.gateway_order_id.as_deref()
    }

    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    pub fn has_completed(&self, step: &str) -> bool {
        self.completed_steps.iter().any(|s| s == step)
    }

    pub fn failed_step(&self) -> Option<&str> {
        self.failed_step.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Every event recorded so far, oldest first.
    pub fn log(&self) -> &[CheckoutEvent] {
        &self.log
    }
}
