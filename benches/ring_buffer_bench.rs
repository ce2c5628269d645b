// Measures append throughput and get_latest readout cost on the raw ring
// at steady-state (post-wraparound) occupancy.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use gsdv_core::buffer::RawRing;
use gsdv_core::models::Sample;

fn bench_ring_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_append");

    for capacity in [1_000usize, 60_000] {
        group.bench_function(BenchmarkId::new("append", capacity), |b| {
            let ring = RawRing::new(capacity);
            let mut seq = 0u32;
            b.iter(|| {
                seq = seq.wrapping_add(1);
                let sample = Sample::raw(seq as u64, seq, seq, 0, [1, 2, 3, 4, 5, 6]);
                ring.append(black_box(&sample));
            });
        });
    }

    group.finish();
}

fn bench_ring_get_latest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_get_latest");

    let ring = RawRing::new(60_000);
    for seq in 0..60_000u32 {
        ring.append(&Sample::raw(seq as u64, seq, seq, 0, [0; 6]));
    }

    for n in [100usize, 10_000] {
        group.bench_function(BenchmarkId::new("get_latest", n), |b| {
            b.iter(|| black_box(ring.get_latest(n)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ring_append, bench_ring_get_latest);
criterion_main!(benches);
