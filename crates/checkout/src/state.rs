//! Where a checkout attempt stands.

use serde::{Deserialize, Serialize};

use crate::events::CheckoutEvent;

/// Lifecycle of one checkout attempt.
///
/// ```text
/// not_started ──► running ──┬──► completed
///                           ├──► failed
///                           └──► compensating ──► failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    NotStarted,
    Running,
    /// Completed steps are being undone after a failure.
    Compensating,
    /// The buyer has a payable order.
    Completed,
    Failed,
}

impl CheckoutState {
    /// The state `event` moves the checkout to, or `None` if the event cannot
    /// happen in this state.
    pub fn on(self, event: &CheckoutEvent) -> Option<Self> {
        use CheckoutEvent as E;
        use CheckoutState as S;

        match (self, event) {
            (S::NotStarted, E::CheckoutStarted(_)) => Some(S::Running),
            (S::Running, E::StepStarted(_) | E::StepCompleted(_) | E::StepFailed(_)) => {
                Some(S::Running)
            }
            (S::Running, E::CompensationStarted(_)) => Some(S::Compensating),
            (
                S::Compensating,
                E::CompensationStepCompleted(_) | E::CompensationStepFailed(_),
            ) => Some(S::Compensating),
            (S::Running, E::CheckoutCompleted(_)) => Some(S::Completed),
            (S::Running | S::Compensating, E::CheckoutFailed(_)) => Some(S::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::NotStarted => "not_started",
            CheckoutState::Running => "running",
            CheckoutState::Compensating => "compensating",
            CheckoutState::Completed => "completed",
            CheckoutState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
