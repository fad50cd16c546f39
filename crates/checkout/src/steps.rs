//! Checkout saga step names.

/// Check the cart, prices, stock and shipping eligibility.
pub const VALIDATE_CART: &str = "validate_cart";

/// Insert the order row in `created`.
pub const CREATE_ORDER: &str = "create_order";

/// Hold stock for every line.
pub const RESERVE_STOCK: &str = "reserve_stock";

/// Ask the payment gateway for a payable order.
pub const CREATE_GATEWAY_ORDER: &str = "create_gateway_order";

/// Store the gateway reference and move the order to `payment_pending`.
pub const ATTACH_GATEWAY_ORDER: &str = "attach_gateway_order";

/// Persist the price-at-purchase snapshot.
pub const SNAPSHOT_ITEMS: &str = "snapshot_items";
