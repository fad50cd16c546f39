use common::{OrderId, VariantId};
use domain::{DomainError, Shortage};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// One or more variants cannot cover the requested quantity.
    /// Nothing was written.
    #[error("Insufficient stock: {}", describe_shortages(.0))]
    OutOfStock(Vec<Shortage>),

    /// The order already holds an active reservation for the variant.
    #[error("Order {order_id} already holds stock for variant {variant_id}")]
    DuplicateReservation {
        order_id: OrderId,
        variant_id: VariantId,
    },

    /// The order's holds expired (or were reaped) before commit and the stock
    /// is no longer available. Nothing was committed.
    #[error("Stock hold for order {order_id} lapsed before commit")]
    HoldLapsed {
        order_id: OrderId,
        variants: Vec<VariantId>,
    },

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order with this id already exists.
    #[error("Order already exists: {0}")]
    OrderExists(OrderId),

    /// The variant does not exist.
    #[error("Variant not found: {0}")]
    VariantNotFound(VariantId),

    /// A stored value could not be mapped to a domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A stored enum value is not recognised.
    #[error("Decode error: {0}")]
    Decode(#[from] DomainError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn describe_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
