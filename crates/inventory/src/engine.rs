//! Reserve, commit and release stock for an order.

use std::sync::Arc;
use std::time::Duration;

use common::{OrderId, UserId};
use domain::{CartLine, Reservation, merge_lines};
use store::{CommitOutcome, InventoryStore, ReserveRequest};

use crate::clock::{Clock, SystemClock};
use crate::error::{ReservationError, Result};

/// Default time a hold stays active before the reaper may reclaim it.
pub const DEFAULT_RESERVATION_TTL: Duration = Duration::from_secs(900);

/// Places and resolves time-bounded stock holds.
///
/// The engine validates requests and delegates every check-then-write to the
/// store, which runs it as one atomic unit.
pub struct ReservationEngine<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for ReservationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: InventoryStore> ReservationEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Holds stock for every line, or for none.
    ///
    /// Lines for the same variant are merged before the availability check.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn reserve(
        &self,
        order_id: OrderId,
        user_id: UserId,
        lines: Vec<CartLine>,
        ttl: Duration,
    ) -> Result<Vec<Reservation>> {
        if lines.is_empty() {
            return Err(ReservationError::InvalidRequest(
                "at least one item is required".to_string(),
            ));
        }
        if let Some(line) = lines.iter().find(|l| l.quantity == 0) {
            return Err(ReservationError::InvalidRequest(format!(
                "quantity for variant {} must be positive",
                line.variant_id
            )));
        }
        if ttl.is_zero() {
            return Err(ReservationError::InvalidRequest(
                "ttl must be positive".to_string(),
            ));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| ReservationError::InvalidRequest("ttl is too large".to_string()))?;

        let now = self.clock.now();
        let request = ReserveRequest {
            order_id,
            user_id,
            lines: merge_lines(lines),
            now,
            expires_at: now + ttl,
        };

        match self.store.reserve(request).await {
            Ok(holds) => {
                metrics::counter!("reservations_created_total").increment(holds.len() as u64);
                tracing::info!(holds = holds.len(), "Stock reserved");
                Ok(holds)
            }
            Err(e) => {
                let err = ReservationError::from(e);
                if let ReservationError::OutOfStock(shortages) = &err {
                    metrics::counter!("reservations_out_of_stock_total").increment(1);
                    tracing::info!(variants = shortages.len(), "Reservation refused: out of stock");
                }
                Err(err)
            }
        }
    }

    /// Converts the order's holds into sales. Safe to repeat.
    #[tracing::instrument(skip(self))]
    pub async fn commit(&self, order_id: OrderId) -> Result<CommitOutcome> {
        let outcome = self.store.commit(order_id, self.clock.now()).await?;
        if outcome.is_noop() {
            tracing::debug!(
                already_committed = outcome.already_committed,
                "Commit replay ignored"
            );
        } else {
            metrics::counter!("reservations_committed_total").increment(outcome.committed as u64);
            tracing::info!(committed = outcome.committed, "Reservations committed");
        }
        Ok(outcome)
    }

    /// Lifts every active hold of the order. Safe to repeat.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, order_id: OrderId) -> Result<usize> {
        let released = self.store.release(order_id, self.clock.now()).await?;
        if released > 0 {
            metrics::counter!("reservations_released_total").increment(released as u64);
            tracing::info!(released, "Reservations released");
        }
        Ok(released)
    }

    /// Every hold ever taken for the order.
    pub async fn reservations_for_order(&self, order_id: OrderId) -> Result<Vec<Reservation>> {
        Ok(self.store.reservations_for_order(order_id).await?)
    }
}
