//! Sellable product variant.

use common::{ProductId, VariantId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// One size/color of a product with its raw stock count.
///
/// `stock_quantity` is raw stock: units physically on hand and not yet sold.
/// It does not account for holds; see [`crate::Availability`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Money,
    pub stock_quantity: u32,
    pub enabled: bool,
    /// Whether the owning product is published.
    pub product_active: bool,
}

impl Variant {
    /// Creates an enabled variant of an active product.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        price: Money,
        stock_quantity: u32,
    ) -> Self {
        Self {
            id: VariantId::new(),
            product_id,
            product_name: product_name.into(),
            size: None,
            color: None,
            price,
            stock_quantity,
            enabled: true,
            product_active: true,
        }
    }

    /// Sets size and color.
    pub fn with_options(mut self, size: impl Into<String>, color: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self.color = Some(color.into());
        self
    }

    /// Returns true if the variant may be sold at all.
    pub fn is_sellable(&self) -> bool {
        self.enabled && self.product_active
    }

    /// Returns a short label such as "Linen Shirt (M / White)".
    pub fn display_name(&self) -> String {
        match (&self.size, &self.color) {
            (Some(size), Some(color)) => format!("{} ({size} / {color})", self.product_name),
            (Some(opt), None) | (None, Some(opt)) => format!("{} ({opt})", self.product_name),
            (None, None) => self.product_name.clone(),
        }
    }
}
