//! Audit sink implementations.
//!
//! The scheduler reports every lifecycle step of a task to an optional sink.
//! Task failures are surfaced here rather than to the producer.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::task::{ExecutionEnvironment, TaskId};
use crate::util::clock::now_ms;

/// Lifecycle step of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Admitted while paused and parked in a priority tier.
    Buffered,
    /// Waiting for its delay timer.
    Delayed,
    /// Handed to a pool or the graphics channel.
    Dispatched,
    /// Finished without panicking.
    Completed,
    /// Panicked; the detail carries the message.
    Failed,
    /// Canceled before it could start.
    Canceled,
    /// Discarded because the scheduler is destroyed.
    Dropped,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Buffered => "buffered",
            Self::Delayed => "delayed",
            Self::Dispatched => "dispatched",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Dropped => "dropped",
        };
        f.write_str(name)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Related task identifier.
    pub task_id: TaskId,
    /// Environment the task targets.
    pub environment: ExecutionEnvironment,
    /// Step taken.
    pub action: AuditAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
///
/// Called from producer, timer and worker threads; implementations must not
/// call back into the scheduler.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: Mutex<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Ids of tasks that reached `action`, in the order they reached it.
    #[must_use]
    pub fn task_ids(&self, action: AuditAction) -> Vec<TaskId> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .map(|e| e.task_id.clone())
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    task_id: impl Into<TaskId>,
    environment: ExecutionEnvironment,
    action: AuditAction,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        task_id: task_id.into(),
        environment,
        action,
        created_at_ms: now_ms(),
        detail,
    }
}
