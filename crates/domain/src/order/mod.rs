//! Order record, lifecycle and related value objects.

mod record;
mod state;
mod value_objects;

pub use record::Order;
pub use state::{OrderStatus, PaymentStatus};
pub use value_objects::{OrderItem, PaymentMethod, ShippingAddress};
