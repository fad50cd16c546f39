//! External collaborators of the checkout: cart, shipping rates and the
//! payment gateway.

pub mod cart;
pub mod payment;
pub mod shipping;

pub use cart::{CartError, CartService, InMemoryCartService};
pub use payment::{
    GatewayError, GatewayOrder, GatewayOrderRequest, HttpPaymentGateway, InMemoryPaymentGateway,
    PaymentGateway,
};
pub use shipping::{
    DEFAULT_FALLBACK_FEE, InMemoryShippingRates, ShippingError, ShippingQuote, ShippingRates,
};
