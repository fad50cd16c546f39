//! Shared types for the checkout and inventory crates.

mod types;

pub use types::{OrderId, ProductId, ReservationId, UserId, VariantId};
