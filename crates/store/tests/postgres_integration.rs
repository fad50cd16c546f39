//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{OrderId, ProductId, UserId, VariantId};
use domain::{
    CartLine, Currency, Money, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
    ReservationStatus, ShippingAddress, Variant,
};
use serial_test::serial;
use sqlx::PgPool;
use store::{InventoryStore, OrderStore, PostgresStore, ReserveRequest, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_inventory_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE reservations, order_items, orders, variants")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

async fn seed_variant(store: &PostgresStore, stock: u32) -> Variant {
    let variant = Variant::new(ProductId::new(), "Linen Shirt", Money::from_minor(149_900), stock)
        .with_options("M", "White");
    store.upsert_variant(&variant).await.unwrap();
    variant
}

fn request(order_id: OrderId, lines: Vec<CartLine>, ttl_secs: i64) -> ReserveRequest {
    let now = Utc::now();
    ReserveRequest {
        order_id,
        user_id: UserId::new(),
        lines,
        now,
        expires_at: now + Duration::seconds(ttl_secs),
    }
}

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Asha Rao".to_string(),
        phone: "+919800000000".to_string(),
        line1: "12 MG Road".to_string(),
        line2: Some("Flat 4".to_string()),
        city: "Bengaluru".to_string(),
        state: "KA".to_string(),
        postal_code: "560001".to_string(),
        country: "IN".to_string(),
    }
}

async fn available(store: &PostgresStore, id: VariantId) -> u32 {
    store.availability(&[id], Utc::now()).await.unwrap()[0].available_to_sell
}

async fn raw_stock(store: &PostgresStore, id: VariantId) -> u32 {
    store.get_variants(&[id]).await.unwrap()[0].stock_quantity
}

#[tokio::test]
#[serial]
async fn test_stock_three_reserve_commit_release() {
    let store = get_test_store().await;
    let v = seed_variant(&store, 3).await;

    let first = OrderId::new();
    store
        .reserve(request(first, vec![CartLine::new(v.id, 2)], 900))
        .await
        .unwrap();
    assert_eq!(available(&store, v.id).await, 1);

    let err = store
        .reserve(request(OrderId::new(), vec![CartLine::new(v.id, 2)], 900))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::OutOfStock(ref s) if s[0].available == 1));

    let outcome = store.commit(first, Utc::now()).await.unwrap();
    assert_eq!(outcome.committed, 1);
    assert_eq!(raw_stock(&store, v.id).await, 1);
    assert_eq!(available(&store, v.id).await, 1);

    let replay = store.commit(first, Utc::now()).await.unwrap();
    assert!(replay.is_noop());
    assert_eq!(raw_stock(&store, v.id).await, 1);
}

#[tokio::test]
#[serial]
async fn test_concurrent_reserves_never_oversell() {
    let store = get_test_store().await;
    let v = seed_variant(&store, 5).await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let store = store.clone();
            let id = v.id;
            tokio::spawn(async move {
                store
                    .reserve(request(OrderId::new(), vec![CartLine::new(id, 1)], 900))
                    .await
            })
        })
        .collect();

    let results = futures_util::future::join_all(tasks).await;
    let succeeded = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();

    assert_eq!(succeeded, 5);
    assert_eq!(available(&store, v.id).await, 0);
}

#[tokio::test]
#[serial]
async fn test_multi_item_reserve_is_atomic() {
    let store = get_test_store().await;
    let a = seed_variant(&store, 5).await;
    let b = seed_variant(&store, 1).await;
    let order_id = OrderId::new();

    let err = store
        .reserve(request(
            order_id,
            vec![CartLine::new(a.id, 1), CartLine::new(b.id, 3)],
            900,
        ))
        .await
        .unwrap_err();

    match err {
        StoreError::OutOfStock(shortages) => {
            assert_eq!(shortages.len(), 1);
            assert_eq!(shortages[0].variant_id, b.id);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.reservations_for_order(order_id).await.unwrap().is_empty());
    assert_eq!(available(&store, a.id).await, 5);
}

#[tokio::test]
#[serial]
async fn test_duplicate_active_hold_maps_to_duplicate_error() {
    let store = get_test_store().await;
    let v = seed_variant(&store, 10).await;
    let order_id = OrderId::new();

    store
        .reserve(request(order_id, vec![CartLine::new(v.id, 1)], 900))
        .await
        .unwrap();
    let err = store
        .reserve(request(order_id, vec![CartLine::new(v.id, 1)], 900))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateReservation { .. }));

    // After release the same order may hold the variant again.
    store.release(order_id, Utc::now()).await.unwrap();
    store
        .reserve(request(order_id, vec![CartLine::new(v.id, 1)], 900))
        .await
        .unwrap();
}

#[tokio::test]
#[serial]
async fn test_expired_holds_do_not_count_and_are_reaped() {
    let store = get_test_store().await;
    let v = seed_variant(&store, 2).await;
    let stale = OrderId::new();

    store
        .reserve(request(stale, vec![CartLine::new(v.id, 2)], -10))
        .await
        .unwrap();
    assert_eq!(available(&store, v.id).await, 2);

    assert_eq!(store.release_expired(Utc::now(), 500).await.unwrap(), 1);
    assert_eq!(store.release_expired(Utc::now(), 500).await.unwrap(), 0);

    let holds = store.reservations_for_order(stale).await.unwrap();
    assert_eq!(holds[0].status, ReservationStatus::Released);
    assert_eq!(raw_stock(&store, v.id).await, 2);
}

#[tokio::test]
#[serial]
async fn test_release_expired_respects_batch_limit() {
    let store = get_test_store().await;
    let v = seed_variant(&store, 100).await;
    for _ in 0..7 {
        store
            .reserve(request(OrderId::new(), vec![CartLine::new(v.id, 1)], -10))
            .await
            .unwrap();
    }

    assert_eq!(store.release_expired(Utc::now(), 5).await.unwrap(), 5);
    assert_eq!(store.release_expired(Utc::now(), 5).await.unwrap(), 2);
}

#[tokio::test]
#[serial]
async fn test_commit_after_reap_reports_lapsed() {
    let store = get_test_store().await;
    let v = seed_variant(&store, 3).await;
    let order_id = OrderId::new();

    store
        .reserve(request(order_id, vec![CartLine::new(v.id, 1)], -10))
        .await
        .unwrap();
    store.release_expired(Utc::now(), 500).await.unwrap();

    let err = store.commit(order_id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, StoreError::HoldLapsed { ref variants, .. } if variants == &vec![v.id]));
    assert_eq!(raw_stock(&store, v.id).await, 3);
}

#[tokio::test]
#[serial]
async fn test_partially_reaped_order_refuses_commit() {
    let store = get_test_store().await;
    let shirt = seed_variant(&store, 5).await;
    let cap = seed_variant(&store, 5).await;
    let order_id = OrderId::new();

    store
        .reserve(request(
            order_id,
            vec![CartLine::new(shirt.id, 1), CartLine::new(cap.id, 1)],
            -10,
        ))
        .await
        .unwrap();
    assert_eq!(store.release_expired(Utc::now(), 1).await.unwrap(), 1);

    let err = store.commit(order_id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, StoreError::HoldLapsed { ref variants, .. } if variants.len() == 1));
    assert_eq!(raw_stock(&store, shirt.id).await, 5);
    assert_eq!(raw_stock(&store, cap.id).await, 5);
}

#[tokio::test]
#[serial]
async fn test_commit_racing_reaper_never_commits_nothing() {
    let store = Arc::new(get_test_store().await);
    let v = seed_variant(&store, 1_000).await;

    for _ in 0..50 {
        let order_id = OrderId::new();
        store
            .reserve(request(order_id, vec![CartLine::new(v.id, 1)], -10))
            .await
            .unwrap();
        let before = raw_stock(&store, v.id).await;

        let (committed, _) = tokio::join!(
            store.commit(order_id, Utc::now()),
            store.release_expired(Utc::now(), 500)
        );
        match committed {
            Ok(outcome) => {
                assert_eq!(outcome.committed, 1);
                assert_eq!(raw_stock(&store, v.id).await, before - 1);
            }
            Err(StoreError::HoldLapsed { .. }) => {
                assert_eq!(raw_stock(&store, v.id).await, before);
            }
            Err(e) => panic!("unexpected commit error: {e}"),
        }
    }
}

#[tokio::test]
#[serial]
async fn test_lapsed_hold_commits_when_stock_free() {
    let store = get_test_store().await;
    let v = seed_variant(&store, 3).await;
    let order_id = OrderId::new();

    store
        .reserve(request(order_id, vec![CartLine::new(v.id, 2)], -10))
        .await
        .unwrap();

    let outcome = store.commit(order_id, Utc::now()).await.unwrap();
    assert_eq!(outcome.committed, 1);
    assert_eq!(raw_stock(&store, v.id).await, 1);
}

#[tokio::test]
#[serial]
async fn test_disabled_variant_reports_zero() {
    let store = get_test_store().await;
    let mut v = seed_variant(&store, 4).await;
    v.enabled = false;
    store.upsert_variant(&v).await.unwrap();

    let a = store.availability(&[v.id], Utc::now()).await.unwrap();
    assert_eq!(a[0].available_to_sell, 0);
    assert!(a[0].is_out_of_stock);
}

#[tokio::test]
#[serial]
async fn test_order_round_trip_and_compare_and_set() {
    let store = get_test_store().await;
    let mut order = Order::draft(
        UserId::new(),
        Money::from_minor(299_800),
        Money::from_minor(4_900),
        Currency::Inr,
        PaymentMethod::Online,
        address(),
    );
    store.insert_order(&order).await.unwrap();
    assert!(matches!(
        store.insert_order(&order).await.unwrap_err(),
        StoreError::OrderExists(_)
    ));

    order.attach_gateway_order("order_gw_1").unwrap();
    store.save_order(&order).await.unwrap();

    let loaded = store.find_by_gateway_order("order_gw_1").await.unwrap().unwrap();
    assert_eq!(loaded.id, order.id);
    assert_eq!(loaded.status, OrderStatus::PaymentPending);
    assert_eq!(loaded.shipping_address, address());
    assert_eq!(loaded.shipping_fee.minor(), 4_900);

    assert!(
        store
            .transition_order(
                order.id,
                OrderStatus::PaymentPending,
                OrderStatus::Paid,
                PaymentStatus::Paid
            )
            .await
            .unwrap()
    );
    assert!(
        !store
            .transition_order(
                order.id,
                OrderStatus::PaymentPending,
                OrderStatus::Paid,
                PaymentStatus::Paid
            )
            .await
            .unwrap()
    );

    let paid = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
#[serial]
async fn test_items_cascade_but_reservations_survive_delete() {
    let store = get_test_store().await;
    let v = seed_variant(&store, 3).await;
    let order = Order::draft(
        UserId::new(),
        Money::from_minor(149_900),
        Money::zero(),
        Currency::Inr,
        PaymentMethod::Online,
        address(),
    );
    store.insert_order(&order).await.unwrap();
    store
        .insert_items(&[OrderItem::new(
            order.id,
            v.id,
            "Linen Shirt",
            1,
            Money::from_minor(149_900),
        )])
        .await
        .unwrap();
    store
        .reserve(request(order.id, vec![CartLine::new(v.id, 1)], 900))
        .await
        .unwrap();
    store.release(order.id, Utc::now()).await.unwrap();

    assert_eq!(store.get_items(order.id).await.unwrap().len(), 1);
    assert!(store.delete_order(order.id).await.unwrap());
    assert!(store.get_items(order.id).await.unwrap().is_empty());
    assert_eq!(store.reservations_for_order(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_price_at_purchase_is_immutable() {
    let store = get_test_store().await;
    let v = seed_variant(&store, 3).await;
    let order = Order::draft(
        UserId::new(),
        Money::from_minor(100),
        Money::zero(),
        Currency::Inr,
        PaymentMethod::Online,
        address(),
    );
    store.insert_order(&order).await.unwrap();
    store
        .insert_items(&[OrderItem::new(order.id, v.id, "Tee", 1, Money::from_minor(100))])
        .await
        .unwrap();

    let result = sqlx::query(
        "UPDATE order_items SET price_at_purchase_minor = 1 WHERE order_id = $1",
    )
    .bind(order.id.as_uuid())
    .execute(store.pool())
    .await;
    assert!(result.is_err());
}
