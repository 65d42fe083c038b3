//! Benchmarks for the map engine scheduler.
//!
//! Benchmarks cover:
//! - Tiered buffer push and priority-ordered drain
//! - Paused admission and the resume flush
//! - Dispatch through the environment pools
//! - Bounded draining of the fallback graphics queue

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mapcore_scheduler::config::SchedulerConfig;
use mapcore_scheduler::core::{
    ExecutionEnvironment, GraphicsQueue, Scheduler, Task, TaskConfig, TaskPriority,
};
use mapcore_scheduler::infra::TieredQueue;

// ============================================================================
// Helpers
// ============================================================================

fn priority_for(i: u64) -> TaskPriority {
    match i % 3 {
        0 => TaskPriority::High,
        1 => TaskPriority::Normal,
        _ => TaskPriority::Low,
    }
}

fn build_task(i: u64, environment: ExecutionEnvironment) -> Task {
    Task::new(
        TaskConfig::new(format!("tile-{i}"), environment).with_priority(priority_for(i)),
        move || {
            black_box(i);
        },
    )
}

fn counting_task(i: u64, environment: ExecutionEnvironment, done: &Arc<AtomicU64>) -> Task {
    let done = Arc::clone(done);
    Task::new(
        TaskConfig::new(format!("tile-{i}"), environment).with_priority(priority_for(i)),
        move || {
            done.fetch_add(1, Ordering::Relaxed);
        },
    )
}

fn spin_until(done: &AtomicU64, target: u64) {
    while done.load(Ordering::Relaxed) < target {
        std::thread::yield_now();
    }
}

// ============================================================================
// Buffer Benchmarks
// ============================================================================

fn bench_tiered_push_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiered_push_drain");

    for size in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut q = TieredQueue::new();
                for i in 0..size {
                    q.push(build_task(i, ExecutionEnvironment::Default));
                }
                black_box(q.drain_in_priority_order().len());
            });
        });
    }
    group.finish();
}

fn bench_tiered_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiered_remove");

    for size in [100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut q = TieredQueue::new();
                for i in 0..size {
                    q.push(build_task(i, ExecutionEnvironment::Io));
                }
                black_box(q.remove(&format!("tile-{}", size / 2)).len());
            });
        });
    }
    group.finish();
}

// ============================================================================
// Scheduler Benchmarks
// ============================================================================

fn bench_paused_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("paused_admission");
    let scheduler = Scheduler::new(SchedulerConfig::default().with_uniform_workers(1))
        .expect("scheduler");

    for size in [100, 1_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    scheduler.add_task(build_task(i, ExecutionEnvironment::Io));
                }
                scheduler.clear();
            });
        });
    }
    group.finish();
    scheduler.destroy();
}

fn bench_resume_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("resume_flush");
    group.measurement_time(Duration::from_secs(10));
    let scheduler = Scheduler::new(SchedulerConfig::default().with_uniform_workers(4))
        .expect("scheduler");

    for size in [100, 1_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let done = Arc::new(AtomicU64::new(0));
                scheduler.pause();
                for i in 0..size {
                    let environment = ExecutionEnvironment::POOLED[(i % 3) as usize];
                    scheduler.add_task(counting_task(i, environment, &done));
                }
                scheduler.resume();
                spin_until(&done, size);
            });
        });
    }
    group.finish();
    scheduler.destroy();
}

fn bench_resumed_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("resumed_dispatch");
    let scheduler = Scheduler::new(
        SchedulerConfig::default()
            .with_uniform_workers(4)
            .with_start_resumed(true),
    )
    .expect("scheduler");

    group.bench_function("computation_1000", |b| {
        b.iter(|| {
            let done = Arc::new(AtomicU64::new(0));
            scheduler.add_tasks(
                (0..1_000).map(|i| counting_task(i, ExecutionEnvironment::Computation, &done)),
            );
            spin_until(&done, 1_000);
        });
    });
    group.finish();
    scheduler.destroy();
}

// ============================================================================
// Graphics Benchmarks
// ============================================================================

fn bench_graphics_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("graphics_run_batch");

    for batch in [8, 64] {
        group.throughput(Throughput::Elements(1_000));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter(|| {
                let queue = GraphicsQueue::new();
                for i in 0..1_000 {
                    queue.push(build_task(i, ExecutionEnvironment::Graphics));
                }
                while queue.run_batch(batch, Duration::from_millis(4)) {}
            });
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(buffer_benches, bench_tiered_push_drain, bench_tiered_remove);

criterion_group!(
    scheduler_benches,
    bench_paused_admission,
    bench_resume_flush,
    bench_resumed_dispatch
);

criterion_group!(graphics_benches, bench_graphics_batches);

criterion_main!(buffer_benches, scheduler_benches, graphics_benches);
