//! Durable record of variants, stock holds and orders.
//!
//! Every operation that checks availability and then mutates holds or raw
//! stock runs as one indivisible unit of work inside the store, so callers
//! never read-then-write stock themselves.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{CommitOutcome, InventoryStore, OrderStore, ReserveRequest};
