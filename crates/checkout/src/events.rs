//! Checkout saga events.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events recorded while a checkout runs.
///
/// Together they form the per-checkout compensation log: which steps
/// finished, which failed and what was undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    CheckoutStarted(CheckoutStartedData),
    StepStarted(StepData),
    StepCompleted(StepCompletedData),
    StepFailed(StepFailedData),
    CompensationStarted(CompensationData),
    CompensationStepCompleted(StepData),
    /// Logged; compensation continues with the next step.
    CompensationStepFailed(StepFailedData),
    CheckoutCompleted(CheckoutFinishedData),
    CheckoutFailed(CheckoutFailedData),
}

impl CheckoutEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::CheckoutStarted(_) => "CheckoutStarted",
            CheckoutEvent::StepStarted(_) => "StepStarted",
            CheckoutEvent::StepCompleted(_) => "StepCompleted",
            CheckoutEvent::StepFailed(_) => "StepFailed",
            CheckoutEvent::CompensationStarted(_) => "CompensationStarted",
            CheckoutEvent::CompensationStepCompleted(_) => "CompensationStepCompleted",
            CheckoutEvent::CompensationStepFailed(_) => "CompensationStepFailed",
            CheckoutEvent::CheckoutCompleted(_) => "CheckoutCompleted",
            CheckoutEvent::CheckoutFailed(_) => "CheckoutFailed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutStartedData {
    pub checkout_id: Uuid,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepData {
    pub step_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCompletedData {
    pub step_name: String,
    /// Set once the order row exists.
    pub order_id: Option<OrderId>,
    /// Set after the gateway created a payable order.
    pub gateway_order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step_name: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step whose failure triggered compensation.
    pub from_step: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutFinishedData {
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl CheckoutEvent {
    pub fn checkout_started(checkout_id: Uuid, user_id: UserId) -> Self {
        CheckoutEvent::CheckoutStarted(CheckoutStartedData {
            checkout_id,
            user_id,
            started_at: Utc::now(),
        })
    }

    pub fn step_started(step_name: impl Into<String>) -> Self {
        CheckoutEvent::StepStarted(StepData {
            step_name: step_name.into(),
        })
    }

    pub fn step_completed(step_name: impl Into<String>) -> Self {
        CheckoutEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            order_id: None,
            gateway_order_id: None,
        })
    }

    pub fn order_created(step_name: impl Into<String>, order_id: OrderId) -> Self {
        CheckoutEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            order_id: Some(order_id),
            gateway_order_id: None,
        })
    }

    pub fn gateway_order_created(
        step_name: impl Into<String>,
        gateway_order_id: impl Into<String>,
    ) -> Self {
        CheckoutEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            order_id: None,
            gateway_order_id: Some(gateway_order_id.into()),
        })
    }

    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        CheckoutEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    pub fn compensation_started(from_step: impl Into<String>) -> Self {
        CheckoutEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
        })
    }

    pub fn compensation_step_completed(step_name: impl Into<String>) -> Self {
        CheckoutEvent::CompensationStepCompleted(StepData {
            step_name: step_name.into(),
        })
    }

    pub fn compensation_step_failed(
        step_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        CheckoutEvent::CompensationStepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    pub fn checkout_completed() -> Self {
        CheckoutEvent::CheckoutCompleted(CheckoutFinishedData {
            completed_at: Utc::now(),
        })
    }

    pub fn checkout_failed(reason: impl Into<String>) -> Self {
        CheckoutEvent::CheckoutFailed(CheckoutFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}
