//! Cart validation and price snapshotting.

use std::collections::HashMap;

use common::{OrderId, VariantId};
use domain::{
    Availability, CartLine, Money, OrderItem, PaymentMethod, ShippingAddress, Shortage, Variant,
    merge_lines,
};

use crate::error::{CheckoutError, Result};
use crate::services::ShippingQuote;

/// A cart line with the price read from the catalog at checkout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub variant_id: VariantId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl PricedLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Cart lines that passed validation, with their price snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    lines: Vec<PricedLine>,
    subtotal: Money,
}

impl PricedCart {
    pub fn lines(&self) -> &[PricedLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    /// Lines to hold stock for.
    pub fn cart_lines(&self) -> Vec<CartLine> {
        self.lines
            .iter()
            .map(|l| CartLine::new(l.variant_id, l.quantity))
            .collect()
    }

    /// Order item rows carrying the snapshotted prices.
    pub fn order_items(&self, order_id: OrderId) -> Vec<OrderItem> {
        self.lines
            .iter()
            .map(|l| {
                OrderItem::new(
                    order_id,
                    l.variant_id,
                    l.product_name.clone(),
                    l.quantity,
                    l.unit_price,
                )
            })
            .collect()
    }
}

/// Rejects an address with a blank required field.
pub fn check_address(address: &ShippingAddress) -> Result<()> {
    match address.missing_field() {
        Some(field) => Err(CheckoutError::Validation(format!(
            "Shipping address is missing {field}"
        ))),
        None => Ok(()),
    }
}

/// Rejects empty carts and zero quantities, then merges repeated variants.
pub fn normalize_lines(lines: Vec<CartLine>) -> Result<Vec<CartLine>> {
    if lines.is_empty() {
        return Err(CheckoutError::Validation("Your cart is empty".to_string()));
    }
    if let Some(line) = lines.iter().find(|l| l.quantity == 0) {
        return Err(CheckoutError::Validation(format!(
            "Quantity for variant {} must be at least 1",
            line.variant_id
        )));
    }
    Ok(merge_lines(lines))
}

/// Prices `lines` against the current catalog and checks stock.
///
/// Every line must name a known, sellable variant. Stock shortages are
/// reported together, after the catalog checks passed.
pub fn price_lines(
    lines: &[CartLine],
    variants: &[Variant],
    availability: &[Availability],
) -> Result<PricedCart> {
    let variants: HashMap<VariantId, &Variant> = variants.iter().map(|v| (v.id, v)).collect();
    let available: HashMap<VariantId, u32> = availability
        .iter()
        .map(|a| (a.variant_id, a.available_to_sell))
        .collect();

    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let variant = variants.get(&line.variant_id).ok_or_else(|| {
            CheckoutError::Validation(format!("Variant {} does not exist", line.variant_id))
        })?;
        if !variant.is_sellable() {
            return Err(CheckoutError::Validation(format!(
                "{} is no longer available",
                variant.display_name()
            )));
        }
        priced.push(PricedLine {
            variant_id: variant.id,
            product_name: variant.display_name(),
            quantity: line.quantity,
            unit_price: variant.price,
        });
    }

    let shortages: Vec<Shortage> = priced
        .iter()
        .filter_map(|line| {
            let available = available.get(&line.variant_id).copied().unwrap_or(0);
            (available < line.quantity).then_some(Shortage {
                variant_id: line.variant_id,
                requested: line.quantity,
                available,
            })
        })
        .collect();
    if !shortages.is_empty() {
        return Err(CheckoutError::OutOfStock(shortages));
    }

    let subtotal = priced.iter().map(PricedLine::line_total).sum();
    Ok(PricedCart {
        lines: priced,
        subtotal,
    })
}

/// Rejects addresses the courier cannot reach and COD where it is not offered.
pub fn check_quote(
    quote: &ShippingQuote,
    address: &ShippingAddress,
    payment_method: PaymentMethod,
) -> Result<()> {
    if !quote.serviceable {
        return Err(CheckoutError::Validation(format!(
            "We do not deliver to postal code {} yet",
            address.postal_code
        )));
    }
    if payment_method == PaymentMethod::Cod && !quote.cod_allowed {
        return Err(CheckoutError::Validation(format!(
            "Cash on delivery is not available for postal code {}",
            address.postal_code
        )));
    }
    Ok(())
}
