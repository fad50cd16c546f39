//! Cart lines as submitted to checkout.

use common::VariantId;
use serde::{Deserialize, Serialize};

/// A requested quantity of one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub variant_id: VariantId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(variant_id: VariantId, quantity: u32) -> Self {
        Self {
            variant_id,
            quantity,
        }
    }
}

/// Folds lines for the same variant into one, keeping first-seen order.
pub fn merge_lines(lines: impl IntoIterator<Item = CartLine>) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::new();
    for line in lines {
        match merged.iter_mut().find(|l| l.variant_id == line.variant_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(line),
        }
    }
    merged
}
