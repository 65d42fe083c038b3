//! Tests for the diagnostics API and the tokio spawner

use mapcore_scheduler::config::SchedulerConfig;
use mapcore_scheduler::core::{ExecutionEnvironment, Scheduler, Task, TaskConfig, TaskPriority};
use mapcore_scheduler::runtime::{health, SchedulerSnapshot};

fn scheduler() -> Scheduler {
    Scheduler::new(SchedulerConfig::default().with_uniform_workers(1)).unwrap()
}

#[test]
fn test_snapshot_counts_buffered_tiers() {
    let scheduler = scheduler();
    scheduler.add_tasks([
        Task::new(
            TaskConfig::new("a", ExecutionEnvironment::Io).with_priority(TaskPriority::High),
            || {},
        ),
        Task::new(TaskConfig::new("b", ExecutionEnvironment::Io), || {}),
        Task::new(TaskConfig::new("c", ExecutionEnvironment::Graphics), || {}),
    ]);

    let snapshot = scheduler.snapshot();
    assert!(!snapshot.resumed);
    assert_eq!(snapshot.buffered_high, 1);
    assert_eq!(snapshot.buffered_normal, 2);
    assert_eq!(snapshot.buffered(), 3);
    assert_eq!(snapshot.pools.len(), 3);
    assert!(!snapshot.separate_graphics_invocation);
    scheduler.destroy();
}

#[test]
fn test_snapshot_serializes() {
    let scheduler = scheduler();
    let json = serde_json::to_string(&scheduler.snapshot()).unwrap();
    let back: SchedulerSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back.pools.len(), 3);
    assert_eq!(back.pools[0].environment, ExecutionEnvironment::Io);
    scheduler.destroy();
}

#[test]
fn test_health_reflects_lifecycle() {
    let scheduler = scheduler();
    let h = health(&scheduler);
    assert!(h.ok);
    assert!(!h.resumed);

    scheduler.resume();
    assert!(health(&scheduler).resumed);

    scheduler.destroy();
    assert!(!health(&scheduler).ok);
}

#[cfg(feature = "tokio-runtime")]
mod tokio_spawner {
    use std::time::Duration;

    use mapcore_scheduler::core::Spawn;
    use mapcore_scheduler::runtime::TokioSpawner;

    use super::scheduler;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tokio_spawner_spawn() {
        let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

        let (tx, rx) = tokio::sync::oneshot::channel();
        spawner.spawn(async move {
            tx.send(123).unwrap();
        });

        let result = rx.await.expect("oneshot result");
        assert_eq!(result, 123);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_launch_respects_pause() {
        let spawner = TokioSpawner::current().expect("inside a runtime");
        let scheduler = scheduler();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        assert!(!scheduler.launch(&spawner, async move {
            let _ = tx.send(());
        }));
        assert!(rx.await.is_err());

        scheduler.resume();
        let (tx, rx) = tokio::sync::oneshot::channel();
        assert!(scheduler.launch(&spawner, async move {
            let _ = tx.send(7);
        }));
        let value = tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("launched future ran")
            .unwrap();
        assert_eq!(value, 7);
        scheduler.destroy();
    }

    #[test]
    fn test_current_outside_runtime() {
        assert!(TokioSpawner::current().is_none());
    }
}
