//! Shared application state.

use std::sync::Arc;

use checkout::{
    CartService, CheckoutConfig, CheckoutOrchestrator, CheckoutStore, OrderService,
    PaymentGateway, PaymentReconciler, RateLimiter, ShippingRates, WebhookVerifier,
};
use inventory::{AvailabilityService, Clock, ExpiryReaper, ReservationEngine, SystemClock};

use crate::config::Config;

/// External collaborators the checkout talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub gateway: Arc<dyn PaymentGateway>,
    pub shipping: Arc<dyn ShippingRates>,
    pub carts: Arc<dyn CartService>,
}

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub availability: AvailabilityService<S>,
    pub checkout: CheckoutOrchestrator<S>,
    pub orders: OrderService<S>,
    /// `None` when no webhook secret is configured; every webhook is refused.
    pub reconciler: Option<PaymentReconciler<S>>,
    pub reaper: ExpiryReaper<S>,
    pub reaper_secret: Option<String>,
}

impl<S: CheckoutStore> AppState<S> {
    pub fn new(store: Arc<S>, collaborators: Collaborators, config: &Config) -> Self {
        Self::with_clock(store, collaborators, config, Arc::new(SystemClock))
    }

    /// Builds every service over one store and one clock.
    pub fn with_clock(
        store: Arc<S>,
        collaborators: Collaborators,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let engine = ReservationEngine::with_clock(Arc::clone(&store), Arc::clone(&clock));

        let checkout = CheckoutOrchestrator::new(
            Arc::clone(&store),
            collaborators.gateway,
            collaborators.shipping,
            collaborators.carts,
        )
        .with_config(CheckoutConfig {
            reservation_ttl: config.reservation_ttl,
            gateway_timeout: config.gateway_timeout,
            currency: config.currency,
            fallback_shipping_fee: config.fallback_shipping_fee,
            ..CheckoutConfig::default()
        })
        .with_rate_limiter(RateLimiter::new(
            config.checkout_rate_limit,
            config.checkout_rate_window,
        ))
        .with_clock(Arc::clone(&clock));

        let reconciler = config.webhook_secret.as_ref().map(|secret| {
            PaymentReconciler::new(
                Arc::clone(&store),
                engine.clone(),
                WebhookVerifier::new(secret),
            )
        });

        Self {
            availability: AvailabilityService::with_clock(Arc::clone(&store), Arc::clone(&clock)),
            checkout,
            orders: OrderService::new(Arc::clone(&store), engine),
            reconciler,
            reaper: ExpiryReaper::new(store)
                .with_clock(clock)
                .with_batch_size(config.reaper_batch_size)
                .with_interval(config.reaper_interval),
            reaper_secret: config.reaper_secret.clone(),
        }
    }
}
