//! Task data model: configuration, priority tiers, execution environments.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller-chosen task identifier.
///
/// Ids are not required to be unique; the latest submission under an id wins
/// for cancellation purposes.
pub type TaskId = String;

/// Priority tier used to flush tasks buffered while the scheduler is paused.
///
/// Ordered `Low < Normal < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    /// Background work such as prefetching.
    Low,
    /// Regular work.
    #[default]
    Normal,
    /// Work visible to the user right now.
    High,
}

impl TaskPriority {
    /// Order in which buffered tiers are flushed on resume.
    pub const DRAIN_ORDER: [Self; 3] = [Self::High, Self::Normal, Self::Low];

    pub(crate) const fn tier(self) -> usize {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

/// Worker context a task must run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionEnvironment {
    /// Blocking I/O: network, disk.
    Io,
    /// CPU-bound work: decoding, tessellation, layout.
    Computation,
    /// Anything else.
    Default,
    /// The render thread that owns the GPU context.
    Graphics,
}

impl ExecutionEnvironment {
    /// Environments served by a worker pool.
    pub const POOLED: [Self; 3] = [Self::Io, Self::Computation, Self::Default];

    /// Lowercase name used in logs, thread names and snapshots.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Io => "io",
            Self::Computation => "computation",
            Self::Default => "default",
            Self::Graphics => "graphics",
        }
    }
}

impl fmt::Display for ExecutionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata describing a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Identifier used for cancellation.
    pub id: TaskId,
    /// Delay before dispatch, in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
    /// Tier used when the task is buffered while paused.
    #[serde(default)]
    pub priority: TaskPriority,
    /// Where the task runs.
    pub environment: ExecutionEnvironment,
}

impl TaskConfig {
    /// Create a zero-delay, normal-priority config.
    pub fn new(id: impl Into<TaskId>, environment: ExecutionEnvironment) -> Self {
        Self {
            id: id.into(),
            delay_ms: 0,
            priority: TaskPriority::Normal,
            environment,
        }
    }

    /// Create a config with a freshly generated unique id.
    #[must_use]
    pub fn anonymous(environment: ExecutionEnvironment) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), environment)
    }

    /// Set the priority tier.
    #[must_use]
    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the dispatch delay in milliseconds.
    #[must_use]
    pub const fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// A unit of schedulable work: a config plus one runnable.
///
/// The runnable is consumed by [`Task::run`], so a task value can execute at
/// most once.
pub struct Task {
    config: TaskConfig,
    runnable: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    /// Bind a closure to a config.
    pub fn new<F>(config: TaskConfig, runnable: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            config,
            runnable: Box::new(runnable),
        }
    }

    /// Task metadata.
    #[must_use]
    pub const fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Task id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub(crate) fn config_mut(&mut self) -> &mut TaskConfig {
        &mut self.config
    }

    /// Run the task on the current thread.
    pub fn run(self) {
        (self.runnable)();
    }

    pub(crate) fn into_parts(self) -> (TaskConfig, Box<dyn FnOnce() + Send + 'static>) {
        (self.config, self.runnable)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
