//! Checkout orchestration and payment reconciliation.
//!
//! The checkout saga runs these steps:
//! 1. Validate cart (prices, stock, shipping eligibility)
//! 2. Create order
//! 3. Reserve stock
//! 4. Create the payable order at the gateway
//! 5. Attach the gateway reference
//! 6. Snapshot order items
//!
//! Once the order exists, a failure undoes completed steps in reverse order.
//! Payment webhooks later commit or release the holds.

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod orders;
pub mod rate_limit;
pub mod reconciliation;
pub mod saga;
pub mod services;
pub mod state;
pub mod steps;
pub mod validation;

pub use error::{CheckoutError, ReconciliationError, Result};
pub use events::CheckoutEvent;
pub use orchestrator::{
    CartSource, CheckoutConfig, CheckoutOrchestrator, CheckoutReceipt, CheckoutRequest,
    CheckoutStore, DEFAULT_GATEWAY_TIMEOUT, DEFAULT_SHIPPING_TIMEOUT,
};
pub use orders::{OrderDetails, OrderService};
pub use rate_limit::RateLimiter;
pub use reconciliation::{PaymentReconciler, ReconcileOutcome, WebhookEvent, WebhookVerifier};
pub use saga::CheckoutSaga;
pub use services::{
    CartError, CartService, DEFAULT_FALLBACK_FEE, GatewayError, GatewayOrder, GatewayOrderRequest,
    HttpPaymentGateway, InMemoryCartService, InMemoryPaymentGateway, InMemoryShippingRates,
    PaymentGateway, ShippingError, ShippingQuote, ShippingRates,
};
pub use state::CheckoutState;
