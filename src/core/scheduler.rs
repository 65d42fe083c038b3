//! Task scheduler: admission, pause buffering, delays, routing and cancellation.
//!
//! A [`Scheduler`] is a cheap, cloneable handle over shared state. Producers
//! call [`add_task`](Scheduler::add_task) from any thread; the scheduler either
//! parks the task in a priority tier (paused) or routes it to the pool of its
//! environment or to the graphics channel (resumed).
//!
//! One coarse `parking_lot::Mutex` guards the tiered buffer and both handle
//! registries. Task bodies and graphics sinks never run while it is held;
//! audit sinks do, so they must not call back into the scheduler.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::builders::SchedulerBuilder;
use crate::config::SchedulerConfig;
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::error::SchedulerError;
use crate::core::executor::{GraphicsTaskSink, Spawn};
use crate::core::graphics::{GraphicsOutbox, GraphicsQueue, SinkSlot};
use crate::core::handle::TaskHandle;
use crate::core::task::{ExecutionEnvironment, Task, TaskId, TaskPriority};
use crate::core::worker_pool::{EnvironmentPools, JobOutcome, PoolJob, PoolStats};
use crate::infra::{DelayTimer, TieredQueue};
use crate::runtime::api::{PoolSnapshot, SchedulerSnapshot};
use crate::util::clock::now_ms;

/// Cancelable entry of the delayed or running registry.
#[derive(Debug, Clone)]
struct Registration {
    handle: TaskHandle,
    environment: ExecutionEnvironment,
}

type Registry = HashMap<TaskId, Registration>;

#[derive(Debug, Default)]
struct SchedulerState {
    buffered: TieredQueue,
    delayed: Registry,
    running: Registry,
}

struct SchedulerInner {
    config: SchedulerConfig,
    /// Written only under `state`; read lock-free by `is_resumed`.
    resumed: AtomicBool,
    destroyed: AtomicBool,
    state: Mutex<SchedulerState>,
    pools: EnvironmentPools,
    timer: DelayTimer,
    graphics_sink: SinkSlot,
    graphics_queue: GraphicsQueue,
    outbox: GraphicsOutbox,
    audit: Option<Arc<dyn AuditSink>>,
    next_generation: AtomicU64,
}

/// Shared handle to the task scheduler.
///
/// Cloning is cheap; every clone drives the same scheduler. Dropping the last
/// clone without calling [`destroy`](Self::destroy) signals the pools and the
/// delay timer to stop but does not join their threads.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Create a scheduler with default collaborators: no audit sink, no
    /// graphics sink, no worker thread hooks.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or a thread cannot be spawned.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        SchedulerBuilder::new(config).build()
    }

    /// Start building a scheduler.
    #[must_use]
    pub fn builder(config: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(config)
    }

    pub(crate) fn from_parts(
        config: SchedulerConfig,
        pools: EnvironmentPools,
        timer: DelayTimer,
        audit: Option<Arc<dyn AuditSink>>,
        graphics_sink: Option<Arc<dyn GraphicsTaskSink>>,
    ) -> Self {
        let resumed = config.start_resumed;
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                resumed: AtomicBool::new(resumed),
                destroyed: AtomicBool::new(false),
                state: Mutex::new(SchedulerState::default()),
                pools,
                timer,
                graphics_sink: RwLock::new(graphics_sink),
                graphics_queue: GraphicsQueue::new(),
                outbox: GraphicsOutbox::default(),
                audit,
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Admit a task.
    ///
    /// While paused the task is buffered in its priority tier; while resumed
    /// it is dispatched at once, or after `delay_ms` if one is set. After
    /// [`destroy`](Self::destroy) the task is dropped with a warning.
    pub fn add_task(&self, task: Task) {
        {
            let mut state = self.inner.state.lock();
            self.inner.admit_locked(&mut state, task);
        }
        self.inner.flush_graphics();
    }

    /// Admit several tasks in order under a single lock acquisition.
    pub fn add_tasks<I>(&self, tasks: I)
    where
        I: IntoIterator<Item = Task>,
    {
        {
            let mut state = self.inner.state.lock();
            for task in tasks {
                self.inner.admit_locked(&mut state, task);
            }
        }
        self.inner.flush_graphics();
    }

    /// Cancel the latest submission under `id`.
    ///
    /// Cancels its delay timer or pending pool job and drops any instance still
    /// buffered or waiting in the fallback graphics queue. A task that is
    /// already executing finishes. Unknown ids are ignored.
    pub fn remove_task(&self, id: &str) {
        let mut canceled: Vec<ExecutionEnvironment> = Vec::new();
        let buffered = {
            let mut state = self.inner.state.lock();
            // Cancel before unlocking: a timer firing right after must see it.
            for registration in [state.delayed.remove(id), state.running.remove(id)]
                .into_iter()
                .flatten()
            {
                registration.handle.cancel();
                canceled.push(registration.environment);
            }
            state.buffered.remove(id)
        };
        let queued_graphics = self.inner.graphics_queue.remove(id);

        canceled.extend(buffered.iter().map(|t| t.config().environment));
        canceled.extend(std::iter::repeat_n(ExecutionEnvironment::Graphics, queued_graphics));

        if canceled.is_empty() {
            debug!(task_id = %id, "remove_task: nothing to cancel");
            return;
        }
        debug!(task_id = %id, removed = canceled.len(), "task canceled");
        for environment in canceled {
            self.inner.record(id, environment, AuditAction::Canceled, Some("remove_task".into()));
        }
    }

    /// Cancel everything outstanding and empty every buffer.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Stop dispatching. Tasks admitted from now on are buffered; work already
    /// dispatched is not interrupted.
    pub fn pause(&self) {
        let _state = self.inner.state.lock();
        self.inner.resumed.store(false, Ordering::Release);
        debug!("scheduler paused");
    }

    /// Resume dispatching and flush buffered tasks High, then Normal, then Low,
    /// FIFO within each tier.
    ///
    /// The flush happens under the state lock, so tasks admitted concurrently
    /// never overtake buffered ones.
    pub fn resume(&self) {
        {
            let mut state = self.inner.state.lock();
            if self.inner.destroyed.load(Ordering::Acquire) {
                return;
            }
            self.inner.resumed.store(true, Ordering::Release);
            let drained = state.buffered.drain_in_priority_order();
            if !drained.is_empty() {
                debug!(count = drained.len(), "flushing buffered tasks");
            }
            for task in drained {
                self.inner.route_locked(&mut state, task);
            }
        }
        self.inner.flush_graphics();
    }

    /// Tear down: cancel everything, stop admission, stop the delay timer and
    /// shut the pools down. Idempotent.
    ///
    /// Safe to call from a task running on one of the scheduler's own threads;
    /// that thread is never joined.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("destroying scheduler");
        self.inner.clear();
        {
            let _state = self.inner.state.lock();
            self.inner.resumed.store(false, Ordering::Release);
        }
        self.inner.graphics_sink.write().take();
        self.inner.timer.shutdown();
        self.inner.pools.shutdown();
        info!("scheduler destroyed");
    }

    /// Whether tasks are dispatched rather than buffered.
    #[must_use]
    pub fn is_resumed(&self) -> bool {
        self.inner.resumed.load(Ordering::Acquire)
    }

    /// Whether [`destroy`](Self::destroy) has been called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Bind or unbind the graphics channel.
    ///
    /// Graphics tasks that collected in the fallback queue while no sink was
    /// bound are handed to the new sink in FIFO order, ahead of anything
    /// routed later.
    pub fn set_graphics_sink(&self, sink: Option<Arc<dyn GraphicsTaskSink>>) {
        {
            let mut bound = self.inner.graphics_sink.write();
            let binding = sink.is_some();
            *bound = sink;
            if binding {
                let parked = self.inner.graphics_queue.take_all();
                if !parked.is_empty() {
                    debug!(count = parked.len(), "handing fallback graphics tasks to sink");
                }
                self.inner.outbox.push_front_all(parked);
            }
        }
        self.inner.flush_graphics();
    }

    /// Whether graphics tasks go to a separate render thread. When `false`,
    /// the host must call [`run_graphics_tasks`](Self::run_graphics_tasks)
    /// from its own GPU thread.
    #[must_use]
    pub fn has_separate_graphics_invocation(&self) -> bool {
        self.inner.graphics_sink.read().is_some()
    }

    /// Run a bounded batch of fallback graphics tasks on the calling thread.
    ///
    /// Returns `true` if tasks remain and the host should request another frame.
    pub fn run_graphics_tasks(&self) -> bool {
        self.inner.graphics_queue.run_batch(
            self.inner.config.graphics_batch_limit,
            self.inner.config.graphics_time_budget(),
        )
    }

    /// Spawn an async job on `spawner` if the scheduler is resumed.
    ///
    /// Returns whether the job was launched.
    pub fn launch<S, F>(&self, spawner: &S, fut: F) -> bool
    where
        S: Spawn,
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_destroyed() || !self.is_resumed() {
            debug!("launch skipped: scheduler not resumed");
            return false;
        }
        spawner.spawn(fut);
        true
    }

    /// Statistics of the pool serving `environment`; `None` for graphics.
    #[must_use]
    pub fn pool_stats(&self, environment: ExecutionEnvironment) -> Option<PoolStats> {
        self.inner.pools.stats(environment)
    }

    /// Point-in-time view of the scheduler for diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> SchedulerSnapshot {
        let (buffered_high, buffered_normal, buffered_low, delayed, running) = {
            let state = self.inner.state.lock();
            (
                state.buffered.tier_len(TaskPriority::High),
                state.buffered.tier_len(TaskPriority::Normal),
                state.buffered.tier_len(TaskPriority::Low),
                state.delayed.len(),
                state.running.len(),
            )
        };
        let pools = ExecutionEnvironment::POOLED
            .into_iter()
            .filter_map(|environment| {
                self.pool_stats(environment)
                    .map(|stats| PoolSnapshot { environment, stats })
            })
            .collect();
        SchedulerSnapshot {
            resumed: self.is_resumed(),
            destroyed: self.is_destroyed(),
            buffered_high,
            buffered_normal,
            buffered_low,
            delayed,
            running,
            graphics_queued: self.inner.graphics_queue.len(),
            separate_graphics_invocation: self.has_separate_graphics_invocation(),
            pools,
            taken_at_ms: now_ms(),
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("resumed", &self.is_resumed())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl SchedulerInner {
    fn next_handle(&self) -> TaskHandle {
        TaskHandle::new(self.next_generation.fetch_add(1, Ordering::Relaxed))
    }

    fn record(
        &self,
        task_id: &str,
        environment: ExecutionEnvironment,
        action: AuditAction,
        detail: Option<String>,
    ) {
        if let Some(sink) = &self.audit {
            sink.record(build_audit_event(task_id, environment, action, detail));
        }
    }

    fn admit_locked(self: &Arc<Self>, state: &mut SchedulerState, task: Task) {
        let environment = task.config().environment;
        if self.destroyed.load(Ordering::Acquire) {
            warn!(task_id = %task.id(), %environment, "scheduler destroyed; dropping task");
            self.record(task.id(), environment, AuditAction::Dropped, Some("destroyed".into()));
            return;
        }
        if self.resumed.load(Ordering::Acquire) {
            self.route_locked(state, task);
        } else {
            debug!(task_id = %task.id(), priority = ?task.config().priority, "buffering task while paused");
            self.record(task.id(), environment, AuditAction::Buffered, None);
            state.buffered.push(task);
        }
    }

    fn route_locked(self: &Arc<Self>, state: &mut SchedulerState, task: Task) {
        let delay_ms = task.config().delay_ms;
        if delay_ms > 0 {
            self.schedule_delayed(state, task, delay_ms);
        } else {
            self.dispatch_now(state, task);
        }
    }

    fn schedule_delayed(self: &Arc<Self>, state: &mut SchedulerState, task: Task, delay_ms: u64) {
        let handle = self.next_handle();
        let generation = handle.generation();
        let id = task.id().to_string();
        let environment = task.config().environment;
        state.delayed.insert(
            id.clone(),
            Registration {
                handle: handle.clone(),
                environment,
            },
        );

        let weak = Arc::downgrade(self);
        let fired = handle.clone();
        let scheduled = self.timer.schedule(Duration::from_millis(delay_ms), handle, move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_delay_elapsed(task, &fired);
            }
        });

        if scheduled {
            debug!(task_id = %id, %environment, delay_ms, "task delayed");
            self.record(&id, environment, AuditAction::Delayed, Some(format!("{delay_ms}ms")));
        } else {
            remove_if_generation(&mut state.delayed, &id, generation);
            warn!(task_id = %id, "delay timer stopped; dropping task");
            self.record(&id, environment, AuditAction::Dropped, Some("timer stopped".into()));
        }
    }

    fn dispatch_now(self: &Arc<Self>, state: &mut SchedulerState, task: Task) {
        let environment = task.config().environment;
        let Some(pool) = self.pools.pool_for(environment) else {
            self.record(task.id(), environment, AuditAction::Dispatched, None);
            self.outbox.push(task);
            return;
        };

        let handle = self.next_handle();
        let generation = handle.generation();
        let (config, runnable) = task.into_parts();
        let id = config.id;
        state.running.insert(
            id.clone(),
            Registration {
                handle: handle.clone(),
                environment,
            },
        );

        let weak = Arc::downgrade(self);
        let finished_id = id.clone();
        let job = PoolJob::new(id.clone(), handle, runnable).on_complete(move |outcome| {
            if let Some(inner) = weak.upgrade() {
                inner.on_job_finished(&finished_id, environment, generation, outcome);
            }
        });

        match pool.submit(job) {
            Ok(()) => self.record(&id, environment, AuditAction::Dispatched, None),
            Err(e) => {
                remove_if_generation(&mut state.running, &id, generation);
                warn!(task_id = %id, %environment, error = %e, "pool rejected task");
                self.record(&id, environment, AuditAction::Dropped, Some(e.to_string()));
            }
        }
    }

    fn flush_graphics(&self) {
        self.outbox.flush(&self.graphics_sink, &self.graphics_queue);
    }

    fn on_delay_elapsed(self: &Arc<Self>, mut task: Task, handle: &TaskHandle) {
        let id = task.id().to_string();
        let environment = task.config().environment;
        {
            let mut state = self.state.lock();
            remove_if_generation(&mut state.delayed, &id, handle.generation());
            if handle.is_canceled() {
                self.record(&id, environment, AuditAction::Canceled, Some("before delay elapsed".into()));
                return;
            }
            if self.destroyed.load(Ordering::Acquire) {
                self.record(&id, environment, AuditAction::Dropped, Some("destroyed".into()));
                return;
            }
            // The delay is consumed whether or not the task can run now.
            task.config_mut().delay_ms = 0;
            if self.resumed.load(Ordering::Acquire) {
                self.dispatch_now(&mut state, task);
            } else {
                debug!(task_id = %id, "delay elapsed while paused; buffering");
                self.record(&id, environment, AuditAction::Buffered, Some("delay elapsed while paused".into()));
                state.buffered.push(task);
            }
        }
        self.flush_graphics();
    }

    fn on_job_finished(
        &self,
        id: &str,
        environment: ExecutionEnvironment,
        generation: u64,
        outcome: JobOutcome,
    ) {
        remove_if_generation(&mut self.state.lock().running, id, generation);
        match outcome {
            JobOutcome::Completed => self.record(id, environment, AuditAction::Completed, None),
            JobOutcome::Failed(message) => {
                self.record(id, environment, AuditAction::Failed, Some(message));
            }
            JobOutcome::Canceled => self.record(id, environment, AuditAction::Canceled, None),
        }
    }

    fn clear(&self) {
        let (delayed, running, buffered) = {
            let mut state = self.state.lock();
            let buffered = state.buffered.len();
            state.buffered.clear();
            // Cancel before unlocking: a timer firing right after must see it.
            for registration in state.delayed.values().chain(state.running.values()) {
                registration.handle.cancel();
            }
            let delayed = std::mem::take(&mut state.delayed).len();
            let running = std::mem::take(&mut state.running).len();
            (delayed, running, buffered)
        };
        let graphics = self.graphics_queue.take_all().len();
        let purged = self.timer.purge_canceled();
        debug!(
            delayed,
            running,
            buffered,
            graphics,
            purged,
            "scheduler cleared"
        );
    }
}

/// Remove `id` only if the registered handle belongs to `generation`, so a
/// newer submission under the same id stays cancelable.
fn remove_if_generation(registry: &mut Registry, id: &str, generation: u64) {
    if registry
        .get(id)
        .is_some_and(|r| r.handle.generation() == generation)
    {
        registry.remove(id);
    }
}
