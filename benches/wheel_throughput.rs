use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use timing_wheel::{Context, SimpleTask, SystemTimer};
use std::time::Duration;

fn add_throughput(c: &mut Criterion) {
    c.bench_function("add_1k_tasks", |b| {
        b.iter_batched(
            || SystemTimer::new(1, 256),
            |timer| {
                for i in 0..1000u64 {
                    timer.add(SimpleTask::new(i, (i % 500) as i64 + 1, || {}));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn advance_clock_latency(c: &mut Criterion) {
    c.bench_function("advance_clock_drain_1k", |b| {
        b.iter_batched(
            || {
                let timer = SystemTimer::new(1, 256);
                for i in 0..1000u64 {
                    timer.add(SimpleTask::new(i, (i % 50) as i64 + 1, || {}));
                }
                timer
            },
            |timer| {
                let (ctx, _cancel) = Context::with_timeout(Duration::from_millis(200));
                while timer.advance_clock(&ctx) {}
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, add_throughput, advance_clock_latency);
criterion_main!(benches);
