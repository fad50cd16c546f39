//! HTTP route handlers.

pub mod availability;
pub mod checkout;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod reaper;
pub mod webhooks;
