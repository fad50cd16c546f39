use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, VariantId};
use domain::{
    Availability, Order, OrderItem, OrderStatus, PaymentStatus, Reservation, ReservationStatus,
    Shortage, Variant, held_quantity,
};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{
        CommitOutcome, InventoryStore, OrderStore, ReserveRequest, ensure_none_released,
        settle_without_holds,
    },
};

#[derive(Debug, Default)]
struct State {
    variants: HashMap<VariantId, Variant>,
    reservations: Vec<Reservation>,
    orders: HashMap<OrderId, Order>,
    items: HashMap<OrderId, Vec<OrderItem>>,
}

impl State {
    fn availability_of(&self, variant: &Variant, now: DateTime<Utc>) -> Availability {
        Availability::for_variant(
            variant,
            held_quantity(&self.reservations, variant.id, now),
        )
    }

    /// Stock a lapsed hold can still claim: raw stock minus every other active hold.
    fn available_without(&self, hold: &Reservation, now: DateTime<Utc>) -> u64 {
        let others: u64 = self
            .reservations
            .iter()
            .filter(|r| r.id != hold.id && r.variant_id == hold.variant_id && r.is_active(now))
            .map(|r| u64::from(r.quantity))
            .sum();
        self.variants
            .get(&hold.variant_id)
            .map(|v| u64::from(v.stock_quantity).saturating_sub(others))
            .unwrap_or(0)
    }
}

/// In-memory store for tests and local development.
///
/// Every mutating operation takes one write lock over the whole state, which
/// serialises reserve/commit/release across all variants. That is stricter
/// than the per-variant locking of the PostgreSQL store and gives the same
/// guarantees.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the given variants.
    pub async fn with_variants(variants: impl IntoIterator<Item = Variant>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write().await;
            for v in variants {
                state.variants.insert(v.id, v);
            }
        }
        store
    }

    /// Returns the total number of reservation rows, in any status.
    pub async fn reservation_count(&self) -> usize {
        self.state.read().await.reservations.len()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Clears all state.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = State::default();
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn upsert_variant(&self, variant: &Variant) -> Result<()> {
        let mut state = self.state.write().await;
        state.variants.insert(variant.id, variant.clone());
        Ok(())
    }

    async fn restock(&self, variant_id: VariantId, quantity: u32) -> Result<Variant> {
        let mut state = self.state.write().await;
        let variant = state
            .variants
            .get_mut(&variant_id)
            .ok_or(StoreError::VariantNotFound(variant_id))?;
        variant.stock_quantity = variant.stock_quantity.saturating_add(quantity);
        Ok(variant.clone())
    }

    async fn get_variants(&self, ids: &[VariantId]) -> Result<Vec<Variant>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.variants.get(id).cloned())
            .collect())
    }

    async fn availability(
        &self,
        ids: &[VariantId],
        now: DateTime<Utc>,
    ) -> Result<Vec<Availability>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.variants.get(id))
            .map(|v| state.availability_of(v, now))
            .collect())
    }

    async fn reserve(&self, request: ReserveRequest) -> Result<Vec<Reservation>> {
        let mut state = self.state.write().await;

        for line in &request.lines {
            let duplicate = state.reservations.iter().any(|r| {
                r.order_id == request.order_id
                    && r.variant_id == line.variant_id
                    && r.status == ReservationStatus::Reserved
            });
            if duplicate {
                return Err(StoreError::DuplicateReservation {
                    order_id: request.order_id,
                    variant_id: line.variant_id,
                });
            }
        }

        let shortages: Vec<Shortage> = request
            .lines
            .iter()
            .filter_map(|line| {
                let available = state
                    .variants
                    .get(&line.variant_id)
                    .map(|v| state.availability_of(v, request.now))
                    .unwrap_or_else(|| Availability::unknown(line.variant_id));
                (!available.covers(line.quantity)).then_some(Shortage {
                    variant_id: line.variant_id,
                    requested: line.quantity,
                    available: available.available_to_sell,
                })
            })
            .collect();
        if !shortages.is_empty() {
            return Err(StoreError::OutOfStock(shortages));
        }

        let holds: Vec<Reservation> = request
            .lines
            .iter()
            .map(|line| {
                Reservation::hold(
                    request.order_id,
                    request.user_id,
                    line.variant_id,
                    line.quantity,
                    request.now,
                    request.expires_at,
                )
            })
            .collect();
        state.reservations.extend(holds.iter().cloned());
        Ok(holds)
    }

    async fn commit(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<CommitOutcome> {
        let mut state = self.state.write().await;

        let mut already_committed = 0;
        let mut released = Vec::new();
        let mut pending = Vec::new();
        for (idx, r) in state.reservations.iter().enumerate() {
            if r.order_id != order_id {
                continue;
            }
            match r.status {
                ReservationStatus::Reserved => pending.push(idx),
                ReservationStatus::Committed => already_committed += 1,
                ReservationStatus::Released => released.push(r.variant_id),
            }
        }
        if pending.is_empty() {
            return settle_without_holds(order_id, already_committed, released);
        }
        ensure_none_released(order_id, released)?;

        let mut lapsed = Vec::new();
        let mut short = Vec::new();
        for &idx in &pending {
            let hold = &state.reservations[idx];
            let raw = state
                .variants
                .get(&hold.variant_id)
                .map(|v| v.stock_quantity)
                .unwrap_or(0);
            if hold.is_lapsed(now) {
                if state.available_without(hold, now) < u64::from(hold.quantity) {
                    lapsed.push(hold.variant_id);
                }
            } else if raw < hold.quantity {
                short.push(Shortage {
                    variant_id: hold.variant_id,
                    requested: hold.quantity,
                    available: raw,
                });
            }
        }
        if !lapsed.is_empty() {
            return Err(StoreError::HoldLapsed {
                order_id,
                variants: lapsed,
            });
        }
        if !short.is_empty() {
            return Err(StoreError::OutOfStock(short));
        }

        for &idx in &pending {
            let (variant_id, quantity) = {
                let hold = &state.reservations[idx];
                (hold.variant_id, hold.quantity)
            };
            if let Some(variant) = state.variants.get_mut(&variant_id) {
                variant.stock_quantity -= quantity;
            }
            state.reservations[idx].transition(ReservationStatus::Committed, now)?;
        }

        Ok(CommitOutcome {
            committed: pending.len(),
            already_committed,
        })
    }

    async fn release(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<usize> {
        let mut state = self.state.write().await;
        let mut released = 0;
        for r in state
            .reservations
            .iter_mut()
            .filter(|r| r.order_id == order_id && r.status == ReservationStatus::Reserved)
        {
            r.transition(ReservationStatus::Released, now)?;
            released += 1;
        }
        Ok(released)
    }

    async fn release_expired(&self, now: DateTime<Utc>, limit: usize) -> Result<usize> {
        let mut state = self.state.write().await;
        let mut released = 0;
        for r in state
            .reservations
            .iter_mut()
            .filter(|r| r.status == ReservationStatus::Reserved && r.expires_at < now)
            .take(limit)
        {
            r.transition(ReservationStatus::Released, now)?;
            released += 1;
        }
        Ok(released)
    }

    async fn reservations_for_order(&self, order_id: OrderId) -> Result<Vec<Reservation>> {
        let state = self.state.read().await;
        Ok(state
            .reservations
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id) {
            return Err(StoreError::OrderExists(order.id));
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn find_by_gateway_order(&self, gateway_order_id: &str) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|o| o.gateway_order_id.as_deref() == Some(gateway_order_id))
            .cloned())
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        let mut state = self.state.write().await;
        let existing = state
            .orders
            .get_mut(&order.id)
            .ok_or(StoreError::OrderNotFound(order.id))?;
        *existing = order.clone();
        Ok(())
    }

    async fn transition_order(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        if order.status != from {
            return Ok(false);
        }
        order.transition(to)?;
        order.payment_status = payment_status;
        Ok(true)
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<bool> {
        let mut state = self.state.write().await;
        state.items.remove(&order_id);
        Ok(state.orders.remove(&order_id).is_some())
    }

    async fn insert_items(&self, items: &[OrderItem]) -> Result<()> {
        let mut state = self.state.write().await;
        for item in items {
            if !state.orders.contains_key(&item.order_id) {
                return Err(StoreError::OrderNotFound(item.order_id));
            }
        }
        for item in items {
            state
                .items
                .entry(item.order_id)
                .or_default()
                .push(item.clone());
        }
        Ok(())
    }

    async fn get_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let state = self.state.read().await;
        Ok(state.items.get(&order_id).cloned().unwrap_or_default())
    }
}
