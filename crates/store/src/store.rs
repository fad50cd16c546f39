use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId, VariantId};
use domain::{
    Availability, CartLine, Order, OrderItem, OrderStatus, PaymentStatus, Reservation, Variant,
};

use crate::{Result, StoreError};

/// Input to [`InventoryStore::reserve`].
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    /// One line per variant; callers merge duplicates first.
    pub lines: Vec<CartLine>,
    /// Time the availability check is evaluated at.
    pub now: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Result of committing an order's holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitOutcome {
    /// Holds converted to sales by this call.
    pub committed: usize,
    /// Holds that an earlier call had already committed.
    pub already_committed: usize,
}

impl CommitOutcome {
    /// Returns true if this call changed nothing.
    pub fn is_noop(&self) -> bool {
        self.committed == 0
    }

    /// Returns true if the order had no holds to commit, now or earlier.
    pub fn is_empty(&self) -> bool {
        self.committed == 0 && self.already_committed == 0
    }
}

/// Decides the commit outcome for an order that has no `reserved` holds left.
///
/// Already-committed holds make this an idempotent replay. Holds that were
/// only ever released mean the order lost its stock before payment landed.
pub(crate) fn settle_without_holds(
    order_id: OrderId,
    already_committed: usize,
    released_variants: Vec<VariantId>,
) -> Result<CommitOutcome> {
    if already_committed == 0 && !released_variants.is_empty() {
        return Err(StoreError::HoldLapsed {
            order_id,
            variants: released_variants,
        });
    }
    Ok(CommitOutcome {
        committed: 0,
        already_committed,
    })
}

/// Refuses to commit an order once any of its holds has been released.
///
/// The reaper works in batches, so an order can be caught with some holds
/// released and the rest still `reserved`.
pub(crate) fn ensure_none_released(
    order_id: OrderId,
    released_variants: Vec<VariantId>,
) -> Result<()> {
    if released_variants.is_empty() {
        return Ok(());
    }
    Err(StoreError::HoldLapsed {
        order_id,
        variants: released_variants,
    })
}

/// Variants and their stock holds.
///
/// Implementations must run `reserve`, `commit`, `release` and
/// `release_expired` each as a single atomic unit against the backing store,
/// serialised per variant, so concurrent callers can never oversell.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Inserts or replaces a variant (administrative).
    async fn upsert_variant(&self, variant: &Variant) -> Result<()>;

    /// Adds units to a variant's raw stock (administrative restock).
    async fn restock(&self, variant_id: VariantId, quantity: u32) -> Result<Variant>;

    /// Loads the variants that exist among `ids`.
    async fn get_variants(&self, ids: &[VariantId]) -> Result<Vec<Variant>>;

    /// Computes available-to-sell for every known variant among `ids`.
    ///
    /// Only `reserved` holds with `expires_at > now` count against stock.
    /// Unknown ids are omitted; callers decide how to report them.
    async fn availability(&self, ids: &[VariantId], now: DateTime<Utc>)
    -> Result<Vec<Availability>>;

    /// Holds stock for every line of the request, or for none.
    ///
    /// Fails with [`StoreError::OutOfStock`] listing every line that could not
    /// be covered, and with [`StoreError::DuplicateReservation`] if the order
    /// already has an active hold on one of the variants.
    async fn reserve(&self, request: ReserveRequest) -> Result<Vec<Reservation>>;

    /// Converts the order's `reserved` holds into sales, decrementing raw stock.
    ///
    /// Idempotent. Holds whose TTL passed are only committed when the stock is
    /// still available without them; otherwise nothing is committed and
    /// [`StoreError::HoldLapsed`] is returned.
    async fn commit(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<CommitOutcome>;

    /// Releases every `reserved` hold of the order. Returns how many changed.
    async fn release(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<usize>;

    /// Releases up to `limit` holds that are `reserved` with `expires_at < now`.
    ///
    /// Returns how many holds were released by this call.
    async fn release_expired(&self, now: DateTime<Utc>, limit: usize) -> Result<usize>;

    /// All holds ever taken for the order, oldest first.
    async fn reservations_for_order(&self, order_id: OrderId) -> Result<Vec<Reservation>>;
}

/// Orders and their item snapshots.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order row.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Loads an order by id.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Loads the order created for a gateway order reference.
    async fn find_by_gateway_order(&self, gateway_order_id: &str) -> Result<Option<Order>>;

    /// Overwrites the mutable fields of an existing order.
    async fn save_order(&self, order: &Order) -> Result<()>;

    /// Moves the order from `from` to `to` only if it is currently in `from`.
    ///
    /// Returns false, without writing, if the order is in any other status.
    async fn transition_order(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Result<bool>;

    /// Deletes an order and its items. Returns false if it did not exist.
    ///
    /// Reservations are kept as an audit trail.
    async fn delete_order(&self, order_id: OrderId) -> Result<bool>;

    /// Writes the price snapshot of an order.
    async fn insert_items(&self, items: &[OrderItem]) -> Result<()>;

    /// Loads the price snapshot of an order.
    async fn get_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;
}
