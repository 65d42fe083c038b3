//! Tests for builder modules

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mapcore_scheduler::builders::{build_pools, SchedulerBuilder};
use mapcore_scheduler::config::SchedulerConfig;
use mapcore_scheduler::core::{ExecutionEnvironment, SchedulerError, WorkerThreadHooks};

#[derive(Default)]
struct CountingHooks {
    started: AtomicUsize,
    stopped: AtomicUsize,
}

impl WorkerThreadHooks for CountingHooks {
    fn on_thread_start(&self, _thread_name: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_thread_stop(&self, _thread_name: &str) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_build_pools_rejects_invalid_config() {
    let mut config = SchedulerConfig::default();
    config.io.worker_count = 0;
    let err = build_pools(&config, None).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(ref msg) if msg.contains("io")));
}

#[test]
fn test_build_pools_sizes_each_environment() {
    let mut config = SchedulerConfig::default().with_uniform_workers(1);
    config.io.worker_count = 3;
    let pools = build_pools(&config, None).unwrap();
    assert_eq!(pools.stats(ExecutionEnvironment::Io).unwrap().worker_count, 3);
    assert_eq!(
        pools.stats(ExecutionEnvironment::Computation).unwrap().worker_count,
        1
    );
    pools.shutdown();
}

#[test]
fn test_scheduler_builder_runs_thread_hooks() {
    let hooks = Arc::new(CountingHooks::default());
    let scheduler = SchedulerBuilder::new(SchedulerConfig::default().with_uniform_workers(2))
        .with_thread_hooks(hooks.clone())
        .build()
        .unwrap();

    scheduler.destroy();
    assert_eq!(hooks.started.load(Ordering::SeqCst), 6);
    assert_eq!(hooks.stopped.load(Ordering::SeqCst), 6);
}

#[test]
fn test_scheduler_builder_honors_start_resumed() {
    let scheduler = SchedulerBuilder::new(
        SchedulerConfig::default()
            .with_uniform_workers(1)
            .with_start_resumed(true),
    )
    .build()
    .unwrap();
    assert!(scheduler.is_resumed());
    scheduler.destroy();
}
