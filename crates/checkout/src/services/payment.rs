//! Payment gateway trait, HTTP client and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::{Currency, Money};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by a payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway refused to create the order.
    #[error("Gateway rejected the order: {0}")]
    Rejected(String),

    /// The gateway could not be reached or answered with a server error.
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway answered with something we could not read.
    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),

    /// Transport error.
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// What the buyer will be asked to pay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrderRequest {
    /// Our order id, sent as the gateway receipt.
    pub receipt: OrderId,
    pub amount: Money,
    pub currency: Currency,
}

/// A payable order created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    /// The gateway's order reference.
    pub id: String,
}

/// Creates payable orders at the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError>;
}

/// Payment gateway speaking the common "create order" REST shape:
/// `POST {base_url}/orders` with HTTP basic auth and a JSON body.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: String,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    id: String,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, request), fields(receipt = %request.receipt))]
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderBody {
                amount: request.amount.minor(),
                currency: request.currency.as_str(),
                receipt: request.receipt.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("{status}: {body}")));
        }
        if !status.is_success() {
            return Err(GatewayError::Unavailable(status.to_string()));
        }

        let body: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        if body.id.is_empty() {
            return Err(GatewayError::InvalidResponse("empty order id".to_string()));
        }
        Ok(GatewayOrder { id: body.id })
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    orders: HashMap<String, GatewayOrderRequest>,
    next_id: u32,
    fail_on_create: bool,
    delay: Option<Duration>,
}

/// In-memory payment gateway for testing and local development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to reject every create call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Makes every create call take at least `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().delay = delay;
    }

    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }

    /// Returns what was requested for a gateway order reference.
    pub fn get_order(&self, id: &str) -> Option<GatewayOrderRequest> {
        self.state.read().unwrap().orders.get(id).cloned()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let delay = self.state.read().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();
        if state.fail_on_create {
            return Err(GatewayError::Unavailable("gateway down".to_string()));
        }

        state.next_id += 1;
        let id = format!("order_{:06}", state.next_id);
        state.orders.insert(id.clone(), request.clone());

        Ok(GatewayOrder { id })
    }
}
