//! Stock availability and time-bounded holds.
//!
//! This crate sits between the storefront and the store:
//! - [`AvailabilityService`] answers available-to-sell queries.
//! - [`ReservationEngine`] places, commits and releases holds for an order.
//! - [`ExpiryReaper`] reclaims holds nobody resolved before their TTL.

pub mod availability;
pub mod clock;
pub mod engine;
pub mod error;
pub mod reaper;

pub use availability::AvailabilityService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{DEFAULT_RESERVATION_TTL, ReservationEngine};
pub use error::{ReservationError, Result};
pub use reaper::{DEFAULT_BATCH_SIZE, DEFAULT_INTERVAL, ExpiryReaper, SweepReport};
