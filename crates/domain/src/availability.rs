//! Available-to-sell arithmetic.

use chrono::{DateTime, Utc};
use common::VariantId;
use serde::{Deserialize, Serialize};

use crate::reservation::Reservation;
use crate::variant::Variant;

/// Sellable quantity of a variant at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub variant_id: VariantId,
    pub available_to_sell: u32,
    pub is_out_of_stock: bool,
}

impl Availability {
    /// Creates an availability entry for a computed quantity.
    pub fn new(variant_id: VariantId, available_to_sell: u32) -> Self {
        Self {
            variant_id,
            available_to_sell,
            is_out_of_stock: available_to_sell == 0,
        }
    }

    /// Raw stock minus active holds, floored at zero.
    ///
    /// A variant that is disabled or belongs to an inactive product is never
    /// available, whatever its stock.
    pub fn for_variant(variant: &Variant, held: u64) -> Self {
        Self::from_stock(
            variant.id,
            variant.stock_quantity,
            variant.is_sellable(),
            held,
        )
    }

    /// Same as [`Availability::for_variant`] from individual columns.
    pub fn from_stock(variant_id: VariantId, stock_quantity: u32, sellable: bool, held: u64) -> Self {
        if !sellable {
            return Self::new(variant_id, 0);
        }
        let available = u64::from(stock_quantity).saturating_sub(held);
        Self::new(variant_id, u32::try_from(available).unwrap_or(u32::MAX))
    }

    /// Availability reported for an id the catalog does not know.
    pub fn unknown(variant_id: VariantId) -> Self {
        Self::new(variant_id, 0)
    }

    /// Returns true if `quantity` units can be held right now.
    pub fn covers(&self, quantity: u32) -> bool {
        self.available_to_sell >= quantity
    }
}

/// A requested quantity that availability could not cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    pub variant_id: VariantId,
    pub requested: u32,
    pub available: u32,
}

impl std::fmt::Display for Shortage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.available == 0 {
            write!(f, "variant {} is out of stock", self.variant_id)
        } else {
            write!(
                f,
                "only {} left of variant {} (requested {})",
                self.available, self.variant_id, self.requested
            )
        }
    }
}

/// Sums the quantity of holds on `variant_id` that are still active at `now`.
///
/// Expired holds that the reaper has not released yet do not count.
pub fn held_quantity<'a, I>(reservations: I, variant_id: VariantId, now: DateTime<Utc>) -> u64
where
    I: IntoIterator<Item = &'a Reservation>,
{
    reservations
        .into_iter()
        .filter(|r| r.variant_id == variant_id && r.is_active(now))
        .map(|r| u64::from(r.quantity))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::reservation::ReservationStatus;
    use chrono::Duration;
    use common::{OrderId, ProductId, UserId};

    fn variant(stock: u32) -> Variant {
        Variant::new(ProductId::new(), "Tee", Money::from_minor(999), stock)
    }

    fn hold(variant_id: VariantId, qty: u32, now: DateTime<Utc>, ttl: i64) -> Reservation {
        Reservation::hold(
            OrderId::new(),
            UserId::new(),
            variant_id,
            qty,
            now,
            now + Duration::seconds(ttl),
        )
    }

    #[test]
    fn test_only_active_holds_count() {
        let v = variant(10);
        let now = Utc::now();
        let mut committed = hold(v.id, 1, now, 900);
        committed
            .transition(ReservationStatus::Committed, now)
            .unwrap();
        let holds = vec![
            hold(v.id, 2, now, 900),
            hold(v.id, 3, now, -1),
            hold(VariantId::new(), 4, now, 900),
            committed,
        ];

        assert_eq!(held_quantity(&holds, v.id, now), 2);
        assert_eq!(Availability::for_variant(&v, 2).available_to_sell, 8);
    }

    #[test]
    fn test_floors_at_zero() {
        let a = Availability::for_variant(&variant(3), 5);
        assert_eq!(a.available_to_sell, 0);
        assert!(a.is_out_of_stock);
    }

    #[test]
    fn test_disabled_variant_is_out_of_stock() {
        let mut v = variant(3);
        v.enabled = false;
        let a = Availability::for_variant(&v, 0);
        assert!(a.is_out_of_stock);
        assert!(!a.covers(1));
    }

    #[test]
    fn test_shortage_message() {
        let id = VariantId::new();
        let s = Shortage {
            variant_id: id,
            requested: 2,
            available: 1,
        };
        assert_eq!(
            s.to_string(),
            format!("only 1 left of variant {id} (requested 2)")
        );
    }
}
