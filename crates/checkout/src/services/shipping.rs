//! Shipping-rate lookup trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Money, ShippingAddress};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Flat fee used when the rate service cannot answer.
pub const DEFAULT_FALLBACK_FEE: Money = Money::from_minor(4_900);

/// Delivery estimate used when the rate service cannot answer.
pub const FALLBACK_ETA_DAYS: u32 = 7;

/// Errors returned by a shipping-rate service.
#[derive(Debug, Error)]
pub enum ShippingError {
    #[error("Shipping rate service unavailable: {0}")]
    Unavailable(String),
}

/// Quote for delivering to one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub serviceable: bool,
    pub cod_allowed: bool,
    pub fee: Money,
    pub eta_days: u32,
}

impl ShippingQuote {
    /// Conservative quote: deliverable, prepaid only, flat fee.
    pub fn fallback(fee: Money) -> Self {
        Self {
            serviceable: true,
            cod_allowed: false,
            fee,
            eta_days: FALLBACK_ETA_DAYS,
        }
    }
}

/// Looks up delivery fee, ETA and COD eligibility.
#[async_trait]
pub trait ShippingRates: Send + Sync {
    async fn quote(
        &self,
        address: &ShippingAddress,
        subtotal: Money,
    ) -> Result<ShippingQuote, ShippingError>;
}

#[derive(Debug)]
struct InMemoryShippingState {
    default_quote: ShippingQuote,
    by_postal_code: HashMap<String, ShippingQuote>,
    fail_on_quote: bool,
}

/// In-memory shipping rates for testing.
#[derive(Debug, Clone)]
pub struct InMemoryShippingRates {
    state: Arc<RwLock<InMemoryShippingState>>,
}

impl InMemoryShippingRates {
    /// Quotes `default_quote` for every address.
    pub fn new(default_quote: ShippingQuote) -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryShippingState {
                default_quote,
                by_postal_code: HashMap::new(),
                fail_on_quote: false,
            })),
        }
    }

    /// Overrides the quote for one postal code.
    pub fn set_quote(&self, postal_code: impl Into<String>, quote: ShippingQuote) {
        self.state
            .write()
            .unwrap()
            .by_postal_code
            .insert(postal_code.into(), quote);
    }

    pub fn set_fail_on_quote(&self, fail: bool) {
        self.state.write().unwrap().fail_on_quote = fail;
    }
}

impl Default for InMemoryShippingRates {
    fn default() -> Self {
        Self::new(ShippingQuote {
            serviceable: true,
            cod_allowed: true,
            fee: Money::zero(),
            eta_days: 4,
        })
    }
}

#[async_trait]
impl ShippingRates for InMemoryShippingRates {
    async fn quote(
        &self,
        address: &ShippingAddress,
        _subtotal: Money,
    ) -> Result<ShippingQuote, ShippingError> {
        let state = self.state.read().unwrap();
        if state.fail_on_quote {
            return Err(ShippingError::Unavailable("rate service down".to_string()));
        }
        Ok(state
            .by_postal_code
            .get(&address.postal_code)
            .copied()
            .unwrap_or(state.default_quote))
    }
}
