use chrono::{Duration, Utc};
use common::{OrderId, ProductId, UserId, VariantId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Availability, CartLine, Money, Reservation, Variant, held_quantity, merge_lines};

fn make_holds(variant_id: VariantId, count: usize) -> Vec<Reservation> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            // Half of the holds are already past their TTL.
            let ttl = if i % 2 == 0 { 900 } else { -60 };
            Reservation::hold(
                OrderId::new(),
                UserId::new(),
                variant_id,
                1,
                now,
                now + Duration::seconds(ttl),
            )
        })
        .collect()
}

fn bench_availability_100_holds(c: &mut Criterion) {
    let variant = Variant::new(ProductId::new(), "Bench Tee", Money::from_minor(999), 1_000);
    let holds = make_holds(variant.id, 100);
    let now = Utc::now();

    c.bench_function("domain/availability_100_holds", |b| {
        b.iter(|| {
            let held = held_quantity(&holds, variant.id, now);
            Availability::for_variant(&variant, held)
        });
    });
}

fn bench_availability_10k_holds(c: &mut Criterion) {
    let variant = Variant::new(ProductId::new(), "Bench Tee", Money::from_minor(999), 100_000);
    let holds = make_holds(variant.id, 10_000);
    let now = Utc::now();

    c.bench_function("domain/availability_10k_holds", |b| {
        b.iter(|| {
            let held = held_quantity(&holds, variant.id, now);
            Availability::for_variant(&variant, held)
        });
    });
}

fn bench_merge_cart_lines(c: &mut Criterion) {
    let ids: Vec<VariantId> = (0..10).map(|_| VariantId::new()).collect();
    let lines: Vec<CartLine> = (0..50).map(|i| CartLine::new(ids[i % 10], 1)).collect();

    c.bench_function("domain/merge_cart_lines_50", |b| {
        b.iter(|| merge_lines(lines.iter().copied()));
    });
}

criterion_group!(
    benches,
    bench_availability_100_holds,
    bench_availability_10k_holds,
    bench_merge_cart_lines,
);
criterion_main!(benches);
