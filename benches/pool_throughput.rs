//! Benchmarks comparing blocking batch throughput across worker counts

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keel_pool::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn spin_work(n: usize) -> u64 {
    (0..64u64).fold(n as u64, |acc, x| acc.wrapping_mul(31).wrapping_add(x))
}

fn bench_blocking_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking_batch");

    for workers in [1, 2, 4, 8].iter() {
        let pool = ThreadPool::new(*workers).expect("Failed to create pool");
        let sink = Arc::new(AtomicU64::new(0));

        group.bench_with_input(BenchmarkId::new("workers", workers), workers, |b, _| {
            b.iter(|| {
                let sink = sink.clone();
                pool.run_task(
                    move |n| {
                        sink.fetch_add(black_box(spin_work(n)), Ordering::Relaxed);
                        Disposition::Done
                    },
                    10_000,
                    true,
                )
                .unwrap();
            })
        });

        pool.release().unwrap();
    }

    group.finish();
}

fn bench_deferred_flush(c: &mut Criterion) {
    let pool = ThreadPool::new(0).expect("Failed to create pool");

    c.bench_function("deferred_flush_10k", |b| {
        b.iter(|| {
            pool.run_task(
                |n| {
                    black_box(spin_work(n));
                    Disposition::Done
                },
                10_000,
                false,
            )
            .unwrap();
            pool.flush().unwrap();
        })
    });
}

criterion_group!(benches, bench_blocking_batch, bench_deferred_flush);
criterion_main!(benches);
