//! Checkout saga orchestrator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{OrderId, UserId};
use domain::{CartLine, Currency, Money, Order, PaymentMethod, ShippingAddress};
use inventory::{AvailabilityService, Clock, DEFAULT_RESERVATION_TTL, ReservationEngine};
use serde::{Deserialize, Serialize};
use store::{InventoryStore, OrderStore};
use uuid::Uuid;

use crate::error::{CheckoutError, Result};
use crate::events::CheckoutEvent;
use crate::rate_limit::{DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW, RateLimiter};
use crate::saga::CheckoutSaga;
use crate::services::{
    CartService, DEFAULT_FALLBACK_FEE, GatewayOrderRequest, PaymentGateway, ShippingQuote,
    ShippingRates,
};
use crate::steps;
use crate::validation::{self, PricedCart};

/// Default bound on the payment gateway call.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on the shipping rate lookup.
pub const DEFAULT_SHIPPING_TIMEOUT: Duration = Duration::from_secs(5);

/// Store capabilities the checkout needs.
pub trait CheckoutStore: InventoryStore + OrderStore + 'static {}

impl<T: InventoryStore + OrderStore + 'static> CheckoutStore for T {}

/// Tunables of the checkout saga.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub reservation_ttl: Duration,
    pub gateway_timeout: Duration,
    pub shipping_timeout: Duration,
    pub currency: Currency,
    /// Shipping fee charged when the rate service cannot answer.
    pub fallback_shipping_fee: Money,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            reservation_ttl: DEFAULT_RESERVATION_TTL,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            shipping_timeout: DEFAULT_SHIPPING_TIMEOUT,
            currency: Currency::Inr,
            fallback_shipping_fee: DEFAULT_FALLBACK_FEE,
        }
    }
}

/// Where the lines of a checkout come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartSource {
    /// The buyer's saved cart.
    Cart,
    /// A single "buy now" line, bypassing the cart.
    BuyNow(CartLine),
}

/// A buyer's request to check out.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub source: CartSource,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
}

/// What the buyer needs to complete payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub gateway_order_reference: String,
    /// Items subtotal.
    pub amount: Money,
    pub currency: Currency,
    pub shipping_fee: Money,
    pub estimated_delivery_days: u32,
    pub cod_allowed: bool,
}

struct ValidatedCheckout {
    cart: PricedCart,
    quote: ShippingQuote,
}

/// Runs the checkout saga: validate, create order, hold stock, create the
/// payable gateway order, attach it and snapshot the items.
///
/// Once the order row exists, any failure undoes the completed steps in
/// reverse order. Undo failures are recorded on the saga log but never
/// replace the error returned to the buyer.
pub struct CheckoutOrchestrator<S> {
    store: Arc<S>,
    engine: ReservationEngine<S>,
    availability: AvailabilityService<S>,
    gateway: Arc<dyn PaymentGateway>,
    shipping: Arc<dyn ShippingRates>,
    carts: Arc<dyn CartService>,
    rate_limiter: RateLimiter,
    config: CheckoutConfig,
}

impl<S> Clone for CheckoutOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            engine: self.engine.clone(),
            availability: self.availability.clone(),
            gateway: Arc::clone(&self.gateway),
            shipping: Arc::clone(&self.shipping),
            carts: Arc::clone(&self.carts),
            rate_limiter: self.rate_limiter.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: CheckoutStore> CheckoutOrchestrator<S> {
    pub fn new(
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
        shipping: Arc<dyn ShippingRates>,
        carts: Arc<dyn CartService>,
    ) -> Self {
        Self {
            engine: ReservationEngine::new(Arc::clone(&store)),
            availability: AvailabilityService::new(Arc::clone(&store)),
            store,
            gateway,
            shipping,
            carts,
            rate_limiter: RateLimiter::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW),
            config: CheckoutConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CheckoutConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Uses `clock` for holds, availability and the rate limiter.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.engine = ReservationEngine::with_clock(Arc::clone(&self.store), Arc::clone(&clock));
        self.availability =
            AvailabilityService::with_clock(Arc::clone(&self.store), Arc::clone(&clock));
        self.rate_limiter = self.rate_limiter.with_clock(clock);
        self
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    pub fn engine(&self) -> &ReservationEngine<S> {
        &self.engine
    }

    /// Runs a checkout and returns the receipt.
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        self.execute(request).await.1
    }

    /// Runs a checkout and also returns the saga with its event log.
    #[tracing::instrument(
        skip(self, request),
        fields(user_id = %request.user_id, payment_method = %request.payment_method)
    )]
    pub async fn execute(&self, request: CheckoutRequest) -> (CheckoutSaga, Result<CheckoutReceipt>) {
        metrics::counter!("checkout_attempts_total").increment(1);
        let mut saga = CheckoutSaga::default();

        if let Err(retry_after) = self.rate_limiter.check_and_record(request.user_id) {
            metrics::counter!("checkout_rate_limited_total").increment(1);
            return (saga, Err(CheckoutError::RateLimited { retry_after }));
        }

        let started = Instant::now();
        saga.record(CheckoutEvent::checkout_started(Uuid::new_v4(), request.user_id));

        let result = self.run(&request, &mut saga).await;
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(receipt) => {
                saga.record(CheckoutEvent::checkout_completed());
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    order_id = %receipt.order_id,
                    gateway_order = %receipt.gateway_order_reference,
                    amount = receipt.amount.minor(),
                    "Checkout completed"
                );
            }
            Err(e) => {
                saga.record(CheckoutEvent::checkout_failed(e.to_string()));
                metrics::counter!("checkout_failed_total", "code" => e.code()).increment(1);
                tracing::info!(code = e.code(), error = %e, "Checkout failed");
            }
        }

        (saga, result)
    }

    async fn run(&self, request: &CheckoutRequest, saga: &mut CheckoutSaga) -> Result<CheckoutReceipt> {
        // 1. Validate cart
        saga.record(CheckoutEvent::step_started(steps::VALIDATE_CART));
        let validated = match self.validate(request).await {
            Ok(validated) => validated,
            Err(e) => {
                saga.record(CheckoutEvent::step_failed(steps::VALIDATE_CART, e.to_string()));
                return Err(e);
            }
        };
        saga.record(CheckoutEvent::step_completed(steps::VALIDATE_CART));

        // 2. Create order
        saga.record(CheckoutEvent::step_started(steps::CREATE_ORDER));
        let mut order = Order::draft(
            request.user_id,
            validated.cart.subtotal(),
            validated.quote.fee,
            self.config.currency,
            request.payment_method,
            request.shipping_address.clone(),
        );
        if let Err(e) = self.store.insert_order(&order).await {
            saga.record(CheckoutEvent::step_failed(steps::CREATE_ORDER, e.to_string()));
            return Err(e.into());
        }
        saga.record(CheckoutEvent::order_created(steps::CREATE_ORDER, order.id));

        // 3. Reserve stock
        saga.record(CheckoutEvent::step_started(steps::RESERVE_STOCK));
        let reserved = self
            .engine
            .reserve(
                order.id,
                request.user_id,
                validated.cart.cart_lines(),
                self.config.reservation_ttl,
            )
            .await;
        if let Err(e) = reserved {
            return Err(self.abort(saga, order.id, steps::RESERVE_STOCK, e.into()).await);
        }
        saga.record(CheckoutEvent::step_completed(steps::RESERVE_STOCK));

        // 4. Create gateway order
        saga.record(CheckoutEvent::step_started(steps::CREATE_GATEWAY_ORDER));
        let gateway_request = GatewayOrderRequest {
            receipt: order.id,
            amount: order.payable_total(),
            currency: order.currency,
        };
        let gateway_order = match tokio::time::timeout(
            self.config.gateway_timeout,
            self.gateway.create_order(&gateway_request),
        )
        .await
        {
            Ok(Ok(gateway_order)) => gateway_order,
            Ok(Err(e)) => {
                let err = CheckoutError::PaymentInit(e.to_string());
                return Err(self.abort(saga, order.id, steps::CREATE_GATEWAY_ORDER, err).await);
            }
            Err(_) => {
                let err = CheckoutError::PaymentInit(format!(
                    "payment gateway did not answer within {}ms",
                    self.config.gateway_timeout.as_millis()
                ));
                return Err(self.abort(saga, order.id, steps::CREATE_GATEWAY_ORDER, err).await);
            }
        };
        saga.record(CheckoutEvent::gateway_order_created(
            steps::CREATE_GATEWAY_ORDER,
            gateway_order.id.clone(),
        ));

        // 5. Attach gateway order
        saga.record(CheckoutEvent::step_started(steps::ATTACH_GATEWAY_ORDER));
        let attached = match order.attach_gateway_order(gateway_order.id.clone()) {
            Ok(()) => self.store.save_order(&order).await.map_err(CheckoutError::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = attached {
            return Err(self.abort(saga, order.id, steps::ATTACH_GATEWAY_ORDER, e).await);
        }
        saga.record(CheckoutEvent::step_completed(steps::ATTACH_GATEWAY_ORDER));

        // 6. Snapshot items
        saga.record(CheckoutEvent::step_started(steps::SNAPSHOT_ITEMS));
        let items = validated.cart.order_items(order.id);
        if let Err(e) = self.store.insert_items(&items).await {
            return Err(self.abort(saga, order.id, steps::SNAPSHOT_ITEMS, e.into()).await);
        }
        saga.record(CheckoutEvent::step_completed(steps::SNAPSHOT_ITEMS));

        Ok(CheckoutReceipt {
            order_id: order.id,
            gateway_order_reference: gateway_order.id,
            amount: order.amount,
            currency: order.currency,
            shipping_fee: order.shipping_fee,
            estimated_delivery_days: validated.quote.eta_days,
            cod_allowed: validated.quote.cod_allowed,
        })
    }

    async fn validate(&self, request: &CheckoutRequest) -> Result<ValidatedCheckout> {
        validation::check_address(&request.shipping_address)?;

        let lines = match &request.source {
            CartSource::BuyNow(line) => vec![*line],
            CartSource::Cart => self
                .carts
                .lines(request.user_id)
                .await
                .map_err(|e| CheckoutError::Unavailable(e.to_string()))?,
        };
        let lines = validation::normalize_lines(lines)?;

        let ids: Vec<_> = lines.iter().map(|l| l.variant_id).collect();
        let variants = self.store.get_variants(&ids).await?;
        let availability = self.availability.availability(&ids).await?;
        let cart = validation::price_lines(&lines, &variants, &availability)?;

        let quote = self.shipping_quote(&request.shipping_address, cart.subtotal()).await;
        validation::check_quote(&quote, &request.shipping_address, request.payment_method)?;

        Ok(ValidatedCheckout { cart, quote })
    }

    /// Asks the rate service, falling back to a flat prepaid-only quote.
    async fn shipping_quote(&self, address: &ShippingAddress, subtotal: Money) -> ShippingQuote {
        let fallback = ShippingQuote::fallback(self.config.fallback_shipping_fee);
        match tokio::time::timeout(
            self.config.shipping_timeout,
            self.shipping.quote(address, subtotal),
        )
        .await
        {
            Ok(Ok(quote)) => quote,
            Ok(Err(e)) => {
                metrics::counter!("checkout_shipping_fallback_total").increment(1);
                tracing::warn!(error = %e, "Shipping rates unavailable, using fallback quote");
                fallback
            }
            Err(_) => {
                metrics::counter!("checkout_shipping_fallback_total").increment(1);
                tracing::warn!(
                    timeout_ms = self.config.shipping_timeout.as_millis() as u64,
                    "Shipping rates timed out, using fallback quote"
                );
                fallback
            }
        }
    }

    /// Records the failed step, compensates and hands back the original error.
    async fn abort(
        &self,
        saga: &mut CheckoutSaga,
        order_id: OrderId,
        step: &str,
        err: CheckoutError,
    ) -> CheckoutError {
        saga.record(CheckoutEvent::step_failed(step, err.to_string()));
        self.compensate(saga, order_id).await;
        err
    }

    /// Undoes completed steps in reverse order. Never fails.
    #[tracing::instrument(skip(self, saga))]
    async fn compensate(&self, saga: &mut CheckoutSaga, order_id: OrderId) {
        let failed_step = saga.failed_step().unwrap_or("unknown").to_string();
        saga.record(CheckoutEvent::compensation_started(&failed_step));
        metrics::counter!("checkout_compensations_total", "step" => failed_step.clone())
            .increment(1);

        let completed: Vec<String> = saga.completed_steps().to_vec();
        for step in completed.iter().rev() {
            let result = match step.as_str() {
                steps::RESERVE_STOCK => self
                    .engine
                    .release(order_id)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                steps::CREATE_ORDER => self
                    .store
                    .delete_order(order_id)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                _ => continue,
            };
            match result {
                Ok(()) => saga.record(CheckoutEvent::compensation_step_completed(step)),
                Err(e) => {
                    tracing::error!(%order_id, step = %step, error = %e, "Compensation step failed");
                    saga.record(CheckoutEvent::compensation_step_failed(step, e));
                }
            }
        }

        tracing::warn!(%order_id, reason = %failed_step, "Checkout rolled back");
    }
}
