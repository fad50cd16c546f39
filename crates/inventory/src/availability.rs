//! Read-side availability for the storefront.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use common::VariantId;
use domain::Availability;
use store::InventoryStore;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;

/// Answers "how many of each variant can be sold right now".
pub struct AvailabilityService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for AvailabilityService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: InventoryStore> AvailabilityService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns one entry per distinct id, in first-seen order.
    ///
    /// Ids the store does not know are reported as out of stock.
    #[tracing::instrument(skip(self, variant_ids), fields(count = variant_ids.len()))]
    pub async fn availability(&self, variant_ids: &[VariantId]) -> Result<Vec<Availability>> {
        let mut seen = HashSet::with_capacity(variant_ids.len());
        let unique: Vec<VariantId> = variant_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let found: HashMap<VariantId, Availability> = self
            .store
            .availability(&unique, self.clock.now())
            .await?
            .into_iter()
            .map(|a| (a.variant_id, a))
            .collect();

        metrics::counter!("availability_queries_total").increment(1);

        Ok(unique
            .into_iter()
            .map(|id| {
                found
                    .get(&id)
                    .copied()
                    .unwrap_or_else(|| Availability::unknown(id))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;
    use domain::{Money, Variant};
    use store::InMemoryStore;

    #[tokio::test]
    async fn test_dedupes_and_fills_unknown_in_input_order() {
        let a = Variant::new(ProductId::new(), "Tee", Money::from_minor(999), 4);
        let store = Arc::new(InMemoryStore::with_variants([a.clone()]).await);
        let service = AvailabilityService::new(store);
        let missing = VariantId::new();

        let result = service
            .availability(&[missing, a.id, missing, a.id])
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0], Availability::unknown(missing));
        assert!(result[0].is_out_of_stock);
        assert_eq!(result[1].variant_id, a.id);
        assert_eq!(result[1].available_to_sell, 4);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let service = AvailabilityService::new(Arc::new(InMemoryStore::new()));
        assert!(service.availability(&[]).await.unwrap().is_empty());
    }
}
