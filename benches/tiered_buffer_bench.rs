// Measures add_sample cost through the T1->T2->T3 cascade, and query
// latency against a fully populated buffer.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use gsdv_core::buffer::{TierName, TieredBuffer};

fn bench_tiered_add_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiered_add_sample");

    group.bench_function(BenchmarkId::new("add_sample", "steady_state"), |b| {
        let buffer = TieredBuffer::default();
        let mut t_ns = 0u64;
        for i in 0..1_000_000u64 {
            buffer.add_sample(i, &[1, 2, 3, 4, 5, 6]);
        }
        b.iter(|| {
            t_ns += 1_000_000;
            buffer.add_sample(black_box(t_ns), black_box(&[1, 2, 3, 4, 5, 6]));
        });
    });

    group.finish();
}

fn bench_tiered_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiered_query");

    let buffer = TieredBuffer::default();
    for i in 0..1_000_000u64 {
        buffer.add_sample(i * 1_000_000, &[1, 2, 3, 4, 5, 6]);
    }

    group.bench_function(BenchmarkId::new("get_tier_data", "t2_full_range"), |b| {
        b.iter(|| black_box(buffer.get_tier_data(TierName::T2, 0, u64::MAX)));
    });

    group.finish();
}

criterion_group!(benches, bench_tiered_add_sample, bench_tiered_query);
criterion_main!(benches);
