//! Tests for utility functions

use std::time::Duration;

use mapcore_scheduler::core::{ExecutionEnvironment, TaskConfig, TaskPriority};
use mapcore_scheduler::util::{frame_interval, init_test_tracing, now_ms, DEFAULT_LOG_DIRECTIVE};

#[test]
fn test_priority_ordering() {
    assert!(TaskPriority::High > TaskPriority::Normal);
    assert!(TaskPriority::Normal > TaskPriority::Low);
    assert_eq!(TaskPriority::default(), TaskPriority::Normal);
}

#[test]
fn test_task_config_defaults() {
    let config = TaskConfig::new("style-reload", ExecutionEnvironment::Default);
    assert_eq!(config.id, "style-reload");
    assert_eq!(config.delay_ms, 0);
    assert_eq!(config.priority, TaskPriority::Normal);
}

#[test]
fn test_anonymous_task_ids_are_unique() {
    let a = TaskConfig::anonymous(ExecutionEnvironment::Io);
    let b = TaskConfig::anonymous(ExecutionEnvironment::Io);
    assert!(!a.id.is_empty());
    assert_ne!(a.id, b.id);
}

#[test]
fn test_frame_interval() {
    assert_eq!(frame_interval(0), None);
    assert_eq!(frame_interval(50), Some(Duration::from_millis(20)));
}

#[test]
fn test_clock_and_tracing_helpers() {
    init_test_tracing();
    init_test_tracing();
    assert!(now_ms() > 0);
    assert!(DEFAULT_LOG_DIRECTIVE.starts_with("mapcore_scheduler"));
}
