//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use mapcore_scheduler::config::{PoolConfig, RenderLoopConfig, SchedulerConfig};
use mapcore_scheduler::core::ExecutionEnvironment;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_pool_config_validation() {
    let valid = PoolConfig::new().with_worker_count(4);
    assert!(valid.validate().is_ok());
    assert_eq!(valid.shutdown_timeout(), Duration::from_millis(2_000));
}

#[test]
fn test_pool_config_invalid_worker_count() {
    let invalid = PoolConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_stack_size() {
    let invalid = PoolConfig::new().with_thread_stack_size(1024);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_timeout() {
    let invalid = PoolConfig::new().with_shutdown_timeout_ms(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_defaults() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert!(!cfg.start_resumed);
    assert_eq!(cfg.io.worker_count, 8);
    assert!(cfg.pool(ExecutionEnvironment::Graphics).is_none());
    assert_eq!(cfg.graphics_time_budget(), Duration::from_millis(4));
}

#[test]
fn test_scheduler_config_names_invalid_pool() {
    let mut cfg = SchedulerConfig::default();
    cfg.computation.worker_count = 0;
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("computation"));
}

#[test]
fn test_scheduler_config_from_json() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{ "io": { "worker_count": 2 }, "start_resumed": true, "graphics_batch_limit": 32 }"#,
    )
    .unwrap();
    assert_eq!(cfg.io.worker_count, 2);
    assert!(cfg.start_resumed);
    assert_eq!(cfg.graphics_batch_limit, 32);
    assert_eq!(cfg.default, SchedulerConfig::default().default);

    assert!(SchedulerConfig::from_json_str("{ not json").is_err());
    assert!(SchedulerConfig::from_json_str(r#"{ "graphics_batch_limit": 0 }"#).is_err());
}

#[test]
fn test_scheduler_config_from_lookup() {
    let cfg = SchedulerConfig::from_lookup(lookup(&[
        ("MAPCORE_IO_WORKERS", "3"),
        ("MAPCORE_START_RESUMED", "true"),
        ("MAPCORE_GRAPHICS_TIME_BUDGET_MS", " 10 "),
    ]))
    .unwrap();
    assert_eq!(cfg.io.worker_count, 3);
    assert!(cfg.start_resumed);
    assert_eq!(cfg.graphics_time_budget_ms, 10);
}

#[test]
fn test_scheduler_config_from_lookup_rejects_garbage() {
    let err = SchedulerConfig::from_lookup(lookup(&[("MAPCORE_DEFAULT_WORKERS", "many")]))
        .unwrap_err();
    assert!(err.to_string().contains("MAPCORE_DEFAULT_WORKERS"));

    assert!(SchedulerConfig::from_lookup(lookup(&[("MAPCORE_IO_WORKERS", "0")])).is_err());
}

#[test]
fn test_render_loop_config_validation() {
    assert!(RenderLoopConfig::default().validate().is_ok());
    assert!(RenderLoopConfig::new().with_idle_wait_ms(0).validate().is_err());
    assert!(RenderLoopConfig::new()
        .with_target_frame_rate(Some(0))
        .validate()
        .is_err());

    let mut unnamed = RenderLoopConfig::new();
    unnamed.thread_name.clear();
    assert!(unnamed.validate().is_err());
}

#[test]
fn test_render_loop_config_from_json() {
    let cfg: RenderLoopConfig =
        serde_json::from_str(r#"{ "max_tasks_per_frame": 4, "target_frame_rate": 30 }"#).unwrap();
    assert_eq!(cfg.max_tasks_per_frame, 4);
    assert_eq!(cfg.frame_interval(), Some(Duration::from_millis(33)));
    assert!(cfg.start_paused);
}
