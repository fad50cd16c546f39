use chrono::{Duration, Utc};
use common::{OrderId, ProductId, UserId, VariantId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CartLine, Money, Variant};
use store::{InMemoryStore, InventoryStore, ReserveRequest};

fn request(order_id: OrderId, lines: Vec<CartLine>) -> ReserveRequest {
    let now = Utc::now();
    ReserveRequest {
        order_id,
        user_id: UserId::new(),
        lines,
        now,
        expires_at: now + Duration::minutes(15),
    }
}

async fn seeded_store(variants: usize, stock: u32) -> (InMemoryStore, Vec<VariantId>) {
    let variants: Vec<Variant> = (0..variants)
        .map(|_| Variant::new(ProductId::new(), "Tee", Money::from_minor(999), stock))
        .collect();
    let ids = variants.iter().map(|v| v.id).collect();
    (InMemoryStore::with_variants(variants).await, ids)
}

fn bench_reserve_single_line(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("store/reserve_single_line", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (store, ids) = seeded_store(1, 10).await;
                store
                    .reserve(request(OrderId::new(), vec![CartLine::new(ids[0], 1)]))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_reserve_cart_of_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("store/reserve_cart_of_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (store, ids) = seeded_store(10, 10).await;
                let lines = ids.iter().map(|id| CartLine::new(*id, 2)).collect();
                store.reserve(request(OrderId::new(), lines)).await.unwrap();
            });
        });
    });
}

fn bench_availability_with_1000_holds(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let (store, ids) = rt.block_on(async {
        let (store, ids) = seeded_store(1, 10_000).await;
        for _ in 0..1_000 {
            store
                .reserve(request(OrderId::new(), vec![CartLine::new(ids[0], 1)]))
                .await
                .unwrap();
        }
        (store, ids)
    });

    c.bench_function("store/availability_1000_holds", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.availability(&ids, Utc::now()).await.unwrap();
            });
        });
    });
}

fn bench_reserve_commit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("store/reserve_then_commit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (store, ids) = seeded_store(3, 10).await;
                let order_id = OrderId::new();
                let lines = ids.iter().map(|id| CartLine::new(*id, 1)).collect();
                store.reserve(request(order_id, lines)).await.unwrap();
                store.commit(order_id, Utc::now()).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_reserve_single_line,
    bench_reserve_cart_of_10,
    bench_availability_with_1000_holds,
    bench_reserve_commit,
);
criterion_main!(benches);
