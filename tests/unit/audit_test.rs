//! Tests for audit sink

use mapcore_scheduler::core::{
    build_audit_event, AuditAction, AuditSink, ExecutionEnvironment, InMemoryAuditSink,
};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);

    sink.record(build_audit_event(
        "tile-1",
        ExecutionEnvironment::Io,
        AuditAction::Dispatched,
        None,
    ));
    sink.record(build_audit_event(
        "tile-1",
        ExecutionEnvironment::Io,
        AuditAction::Failed,
        Some("timeout".to_string()),
    ));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].task_id, "tile-1");
    assert_eq!(events[0].action, AuditAction::Dispatched);
    assert_eq!(events[1].detail.as_deref(), Some("timeout"));
    assert_eq!(sink.task_ids(AuditAction::Failed), vec!["tile-1"]);
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);
    for id in ["a", "b", "c"] {
        sink.record(build_audit_event(
            id,
            ExecutionEnvironment::Default,
            AuditAction::Buffered,
            None,
        ));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].task_id, "b"); // Oldest evicted
    assert_eq!(events[1].task_id, "c");
}

#[test]
fn test_audit_event_serializes_snake_case() {
    let event = build_audit_event(
        "label-7",
        ExecutionEnvironment::Graphics,
        AuditAction::Canceled,
        Some("remove_task".to_string()),
    );
    assert!(event.created_at_ms > 0);

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["action"], "canceled");
    assert_eq!(json["environment"], "GRAPHICS");
    assert_eq!(json["detail"], "remove_task");
}
