//! Domain layer for the checkout and inventory system.
//!
//! This crate holds the plain records and rules shared by every other crate:
//! - Money and currency value objects
//! - Order and order item records with the order lifecycle state machine
//! - Variant and reservation records with the reservation state machine
//! - Available-to-sell arithmetic

pub mod availability;
pub mod cart;
pub mod error;
pub mod money;
pub mod order;
pub mod reservation;
pub mod variant;

pub use availability::{Availability, Shortage, held_quantity};
pub use cart::{CartLine, merge_lines};
pub use error::DomainError;
pub use money::{Currency, Money};
pub use order::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress};
pub use reservation::{Reservation, ReservationStatus};
pub use variant::Variant;
