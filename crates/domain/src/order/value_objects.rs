//! Value objects for the order domain.

use common::{OrderId, VariantId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// How the buyer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card, UPI, netbanking or wallet through the payment gateway.
    #[default]
    Online,
    /// Cash on delivery.
    Cod,
}

impl PaymentMethod {
    /// Returns the method name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Online => "online",
            PaymentMethod::Cod => "cod",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(PaymentMethod::Online),
            "cod" => Ok(PaymentMethod::Cod),
            other => Err(DomainError::UnknownValue {
                kind: "payment method",
                value: other.to_string(),
            }),
        }
    }
}

/// Delivery address captured at checkout time.
///
/// Stored on the order as a snapshot so later edits to the buyer's address book
/// do not rewrite where an order was shipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Returns the first required field that is blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// A line of a placed order with the price the buyer was charged.
///
/// `price_at_purchase` is fixed when the order is created and never
/// recalculated from the catalog afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub variant_id: VariantId,
    /// Product name at the time of purchase, for receipts.
    pub product_name: String,
    pub quantity: u32,
    pub price_at_purchase: Money,
}

impl OrderItem {
    /// Creates a new order item snapshot.
    pub fn new(
        order_id: OrderId,
        variant_id: VariantId,
        product_name: impl Into<String>,
        quantity: u32,
        price_at_purchase: Money,
    ) -> Self {
        Self {
            order_id,
            variant_id,
            product_name: product_name.into(),
            quantity,
            price_at_purchase,
        }
    }

    /// Returns quantity * price_at_purchase.
    pub fn line_total(&self) -> Money {
        self.price_at_purchase.multiply(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Asha Rao".to_string(),
            phone: "+919800000000".to_string(),
            line1: "12 MG Road".to_string(),
            line2: None,
            city: "Bengaluru".to_string(),
            state: "KA".to_string(),
            postal_code: "560001".to_string(),
            country: "IN".to_string(),
        }
    }

    #[test]
    fn test_complete_address_has_no_missing_field() {
        assert_eq!(address().missing_field(), None);
    }

    #[test]
    fn test_blank_postal_code_is_reported() {
        let mut addr = address();
        addr.postal_code = "  ".to_string();
        assert_eq!(addr.missing_field(), Some("postal_code"));
    }

    #[test]
    fn test_order_item_line_total() {
        let item = OrderItem::new(
            OrderId::new(),
            VariantId::new(),
            "Linen Shirt",
            3,
            Money::from_minor(149_900),
        );
        assert_eq!(item.line_total().minor(), 449_700);
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("cod".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cod);
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }
}
