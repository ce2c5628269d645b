// Measures steady-state per-sample cost of the 6-channel Butterworth
// low-pass filter at a representative acquisition rate.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use gsdv_core::processing::LowPassFilter;

fn bench_filter_process_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_process_sample");

    for cutoff_hz in [5.0, 50.0] {
        group.bench_function(BenchmarkId::new("process_sample", format!("cutoff_{cutoff_hz}hz")), |b| {
            let mut filter = LowPassFilter::<6>::new(cutoff_hz, 1000.0).unwrap();
            filter.prime(&[0.0; 6]);
            let mut t = 0.0f64;
            b.iter(|| {
                t += 1.0;
                let x = [t, t, t, t, t, t];
                black_box(filter.process_sample(black_box(&x)));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filter_process_sample);
criterion_main!(benches);
