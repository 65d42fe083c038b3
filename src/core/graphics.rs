//! Fallback graphics queue for hosts that drive GPU work themselves.
//!
//! When no [`GraphicsTaskSink`](super::executor::GraphicsTaskSink) is bound,
//! graphics tasks collect here and the host drains them from its own render
//! callback with [`Scheduler::run_graphics_tasks`](super::Scheduler::run_graphics_tasks).

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::error;

use super::error::{panic_message, TaskExecutionError};
use super::executor::GraphicsTaskSink;
use super::task::{ExecutionEnvironment, Task};

/// FIFO of graphics tasks drained in bounded batches.
#[derive(Debug, Default)]
pub struct GraphicsQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl GraphicsQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task.
    pub fn push(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Drop every queued task with this id. Returns how many were dropped.
    pub fn remove(&self, id: &str) -> usize {
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|t| t.id() != id);
        before - tasks.len()
    }

    /// Remove and return every queued task in FIFO order.
    pub fn take_all(&self) -> Vec<Task> {
        self.tasks.lock().drain(..).collect()
    }

    /// Run up to `max_tasks` tasks on the calling thread, stopping early once
    /// `budget` has elapsed. At least one task runs if any is queued.
    ///
    /// Returns `true` if tasks remain afterwards.
    pub fn run_batch(&self, max_tasks: usize, budget: Duration) -> bool {
        let started = Instant::now();
        for _ in 0..max_tasks {
            // Pop under the lock, run outside it: tasks may enqueue more work.
            let Some(task) = self.tasks.lock().pop_front() else {
                return false;
            };
            run_isolated(task);
            if started.elapsed() >= budget {
                break;
            }
        }
        !self.is_empty()
    }
}

/// Bound graphics sink, if any.
pub(crate) type SinkSlot = RwLock<Option<Arc<dyn GraphicsTaskSink>>>;

/// Hand-off buffer between the scheduler lock and the graphics sink.
///
/// Tasks are pushed while the scheduler lock is held, so push order is routing
/// order. [`flush`](Self::flush) forwards them after that lock is released.
/// Only one thread forwards at a time; a sink that re-enters the scheduler
/// appends to this buffer and the running flush picks the task up.
///
/// Each task is popped and its destination chosen under the sink slot's read
/// lock, so binding a sink (which holds the write lock) never interleaves
/// with a task on its way to the fallback queue.
#[derive(Debug, Default)]
pub(crate) struct GraphicsOutbox {
    state: Mutex<OutboxState>,
}

#[derive(Debug, Default)]
struct OutboxState {
    tasks: VecDeque<Task>,
    forwarding: bool,
}

struct ForwardingGuard<'a>(&'a GraphicsOutbox);

impl Drop for ForwardingGuard<'_> {
    fn drop(&mut self) {
        // Normal exits clear the flag under the lock; this only covers unwinding.
        if std::thread::panicking() {
            self.0.state.lock().forwarding = false;
        }
    }
}

impl GraphicsOutbox {
    pub(crate) fn push(&self, task: Task) {
        self.state.lock().tasks.push_back(task);
    }

    /// Put `tasks` ahead of everything waiting, keeping their order.
    pub(crate) fn push_front_all(&self, tasks: Vec<Task>) {
        let mut state = self.state.lock();
        for task in tasks.into_iter().rev() {
            state.tasks.push_front(task);
        }
    }

    /// Forward waiting tasks to the bound sink, or park them in `fallback`
    /// while none is bound. Returns at once if another thread is forwarding.
    pub(crate) fn flush(&self, sink: &SinkSlot, fallback: &GraphicsQueue) {
        {
            let mut state = self.state.lock();
            if state.forwarding || state.tasks.is_empty() {
                return;
            }
            state.forwarding = true;
        }
        let _guard = ForwardingGuard(self);
        loop {
            let (task, target) = {
                let bound = sink.read();
                let mut state = self.state.lock();
                let Some(task) = state.tasks.pop_front() else {
                    state.forwarding = false;
                    return;
                };
                drop(state);
                match bound.as_ref() {
                    Some(target) => (task, Arc::clone(target)),
                    None => {
                        fallback.push(task);
                        continue;
                    }
                }
            };
            // The sink may re-enter the scheduler, so no lock is held here.
            target.schedule_graphics(task);
        }
    }
}

/// Run a graphics task, containing any panic to the task itself.
pub(crate) fn run_isolated(task: Task) {
    let (config, runnable) = task.into_parts();
    if let Err(payload) = catch_unwind(AssertUnwindSafe(runnable)) {
        let err = TaskExecutionError {
            task_id: config.id,
            environment: ExecutionEnvironment::Graphics,
            message: panic_message(payload.as_ref()),
        };
        error!(error = %err, "graphics task panicked");
    }
}
