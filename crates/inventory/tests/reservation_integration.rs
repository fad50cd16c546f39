//! End-to-end reservation behaviour against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use common::{OrderId, ProductId, UserId, VariantId};
use domain::{CartLine, Money, Variant};
use inventory::{
    AvailabilityService, DEFAULT_RESERVATION_TTL, ExpiryReaper, ManualClock, ReservationEngine,
    ReservationError,
};
use store::{InMemoryStore, InventoryStore};

struct Harness {
    store: Arc<InMemoryStore>,
    clock: ManualClock,
    engine: ReservationEngine<InMemoryStore>,
    availability: AvailabilityService<InMemoryStore>,
    reaper: ExpiryReaper<InMemoryStore>,
}

async fn harness(variants: Vec<Variant>) -> Harness {
    let store = Arc::new(InMemoryStore::with_variants(variants).await);
    let clock = ManualClock::default();
    Harness {
        engine: ReservationEngine::with_clock(Arc::clone(&store), Arc::new(clock.clone())),
        availability: AvailabilityService::with_clock(Arc::clone(&store), Arc::new(clock.clone())),
        reaper: ExpiryReaper::new(Arc::clone(&store)).with_clock(Arc::new(clock.clone())),
        store,
        clock,
    }
}

fn variant(stock: u32) -> Variant {
    Variant::new(ProductId::new(), "Pleated Skirt", Money::from_minor(249_900), stock)
        .with_options("S", "Navy")
}

async fn available(h: &Harness, id: VariantId) -> u32 {
    h.availability.availability(&[id]).await.unwrap()[0].available_to_sell
}

#[tokio::test]
async fn test_concurrent_reserves_never_oversell() {
    let v = variant(5);
    let h = harness(vec![v.clone()]).await;

    let attempts = (0..25).map(|_| {
        let engine = h.engine.clone();
        let id = v.id;
        async move {
            engine
                .reserve(
                    OrderId::new(),
                    UserId::new(),
                    vec![CartLine::new(id, 1)],
                    DEFAULT_RESERVATION_TTL,
                )
                .await
        }
    });
    let results = futures_util::future::join_all(attempts).await;

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let out_of_stock = results
        .iter()
        .filter(|r| matches!(r, Err(ReservationError::OutOfStock(_))))
        .count();
    assert_eq!(ok, 5);
    assert_eq!(out_of_stock, 20);
    assert_eq!(available(&h, v.id).await, 0);
}

#[tokio::test]
async fn test_multi_item_failure_lists_every_short_variant() {
    let a = variant(1);
    let b = variant(0);
    let c = variant(10);
    let h = harness(vec![a.clone(), b.clone(), c.clone()]).await;
    let order_id = OrderId::new();

    let err = h
        .engine
        .reserve(
            order_id,
            UserId::new(),
            vec![
                CartLine::new(a.id, 2),
                CartLine::new(b.id, 1),
                CartLine::new(c.id, 1),
            ],
            DEFAULT_RESERVATION_TTL,
        )
        .await
        .unwrap_err();

    match err {
        ReservationError::OutOfStock(shortages) => {
            let ids: Vec<VariantId> = shortages.iter().map(|s| s.variant_id).collect();
            assert_eq!(ids, vec![a.id, b.id]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.engine.reservations_for_order(order_id).await.unwrap().is_empty());
    assert_eq!(available(&h, c.id).await, 10);
}

#[tokio::test]
async fn test_disabled_variant_cannot_be_reserved() {
    let mut v = variant(5);
    v.product_active = false;
    let h = harness(vec![v.clone()]).await;

    assert_eq!(available(&h, v.id).await, 0);
    let err = h
        .engine
        .reserve(
            OrderId::new(),
            UserId::new(),
            vec![CartLine::new(v.id, 1)],
            DEFAULT_RESERVATION_TTL,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OUT_OF_STOCK");
}

#[tokio::test]
async fn test_ttl_then_reap_then_commit() {
    let v = variant(1);
    let h = harness(vec![v.clone()]).await;
    let slow = OrderId::new();

    h.engine
        .reserve(slow, UserId::new(), vec![CartLine::new(v.id, 1)], Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(available(&h, v.id).await, 0);

    h.clock.advance(chrono::Duration::seconds(61));
    assert_eq!(available(&h, v.id).await, 1);

    // Another buyer takes the unit while the slow hold is lapsed but unreaped.
    let fast = OrderId::new();
    h.engine
        .reserve(fast, UserId::new(), vec![CartLine::new(v.id, 1)], DEFAULT_RESERVATION_TTL)
        .await
        .unwrap();

    let err = h.engine.commit(slow).await.unwrap_err();
    assert_eq!(err.code(), "HOLD_LAPSED");

    let report = h.reaper.sweep().await.unwrap();
    assert_eq!(report.reservations_processed, 1);

    let outcome = h.engine.commit(fast).await.unwrap();
    assert_eq!(outcome.committed, 1);
    let raw = h.store.get_variants(&[v.id]).await.unwrap()[0].stock_quantity;
    assert_eq!(raw, 0);
}

#[tokio::test]
async fn test_commit_is_idempotent_across_replays() {
    let v = variant(4);
    let h = harness(vec![v.clone()]).await;
    let order_id = OrderId::new();

    h.engine
        .reserve(order_id, UserId::new(), vec![CartLine::new(v.id, 3)], DEFAULT_RESERVATION_TTL)
        .await
        .unwrap();

    for _ in 0..3 {
        h.engine.commit(order_id).await.unwrap();
    }
    let raw = h.store.get_variants(&[v.id]).await.unwrap()[0].stock_quantity;
    assert_eq!(raw, 1);
    assert_eq!(available(&h, v.id).await, 1);
}
