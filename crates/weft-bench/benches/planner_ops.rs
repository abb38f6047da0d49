//! Criterion micro-benchmarks for core allocation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use weft_bench::{cluster_profile, fan_out_profile};
use weft_planner::Planner;

/// Benchmark: Place macro + micro[1000] (1 core each) on 16 x 64 cores.
fn bench_allocate_1k_single_core(c: &mut Criterion) {
    let model = fan_out_profile(1000, 1).unwrap();
    let planner = Planner::new(cluster_profile(16, 64));

    c.bench_function("allocate_1k_single_core", |b| {
        b.iter(|| {
            let allocation = planner.allocate_all(&model, false).unwrap();
            black_box(allocation);
        });
    });
}

/// Benchmark: Place micro[200] at 4 threads each on 8 x 32 cores,
/// which only fits by sharing cores.
fn bench_allocate_oversubscribed(c: &mut Criterion) {
    let model = fan_out_profile(200, 4).unwrap();
    let planner = Planner::new(cluster_profile(8, 32));

    c.bench_function("allocate_oversubscribed", |b| {
        b.iter(|| {
            let allocation = planner.allocate_all(&model, true).unwrap();
            black_box(allocation);
        });
    });
}

criterion_group!(
    benches,
    bench_allocate_1k_single_core,
    bench_allocate_oversubscribed
);
criterion_main!(benches);
