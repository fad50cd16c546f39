//! Cart service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::UserId;
use domain::CartLine;
use thiserror::Error;

/// Errors returned by a cart service.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Cart service unavailable: {0}")]
    Unavailable(String),
}

/// Reads the buyer's saved cart.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Returns the lines of the user's cart. An unknown user has an empty cart.
    async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, CartError>;
}

/// In-memory carts for testing and local development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartService {
    carts: Arc<RwLock<HashMap<UserId, Vec<CartLine>>>>,
}

impl InMemoryCartService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the user's cart.
    pub fn set_cart(&self, user_id: UserId, lines: Vec<CartLine>) {
        self.carts.write().unwrap().insert(user_id, lines);
    }

    pub fn clear(&self, user_id: UserId) {
        self.carts.write().unwrap().remove(&user_id);
    }
}

#[async_trait]
impl CartService for InMemoryCartService {
    async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, CartError> {
        Ok(self
            .carts
            .read()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}
