// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use actorhost::serializer::ExecutionSerializer;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const JOBS_PER_ITER: u64 = 200;

fn same_key_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("offer: all jobs under one key", |b| {
        b.to_async(&rt).iter(|| async {
            let serializer = ExecutionSerializer::<u32>::new();
            let done = Arc::new(AtomicU64::new(0));
            for _ in 0..black_box(JOBS_PER_ITER) {
                let done = done.clone();
                serializer.offer(Some(0), Box::pin(async move { done.fetch_add(1, Ordering::Relaxed); }), JOBS_PER_ITER as usize);
            }
            while done.load(Ordering::Relaxed) < JOBS_PER_ITER {
                tokio::task::yield_now().await;
            }
        })
    });
}

fn distinct_key_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("offer: one key per job", |b| {
        b.to_async(&rt).iter(|| async {
            let serializer = ExecutionSerializer::<u32>::new();
            let done = Arc::new(AtomicU64::new(0));
            for key in 0..black_box(JOBS_PER_ITER as u32) {
                let done = done.clone();
                serializer.offer(Some(key), Box::pin(async move { done.fetch_add(1, Ordering::Relaxed); }), 1);
            }
            while done.load(Ordering::Relaxed) < JOBS_PER_ITER {
                tokio::task::yield_now().await;
            }
        })
    });
}

criterion_group!(benches, same_key_throughput, distinct_key_throughput);
criterion_main!(benches);
