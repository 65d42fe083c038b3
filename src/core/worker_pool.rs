//! Environment worker pools backed by dedicated OS threads.
//!
//! Each pooled [`ExecutionEnvironment`] gets its own [`EnvironmentPool`], so a
//! burst of blocking I/O cannot starve CPU-bound decoding and vice versa.
//!
//! # Design
//!
//! - **No polling**: workers block on `recv` of an unbounded crossbeam channel
//! - **Clean shutdown**: dropping the sender unblocks idle workers
//! - **Isolation**: a panicking job is caught and ends only itself
//! - **Lock-free stats**: atomic counters snapshotted into [`PoolStats`]
//!
//! # Example
//!
//! ```rust,ignore
//! use mapcore_scheduler::core::{EnvironmentPool, PoolJob, TaskHandle, ExecutionEnvironment};
//! use mapcore_scheduler::config::PoolConfig;
//!
//! let pool = EnvironmentPool::new(ExecutionEnvironment::Io, &PoolConfig::new(), None)?;
//! pool.submit(PoolJob::new("tile-12", TaskHandle::new(0), || fetch_tile()))?;
//! pool.shutdown();
//! ```

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{PoolConfig, SchedulerConfig};
use crate::core::error::{panic_message, TaskExecutionError};
use crate::core::executor::WorkerThreadHooks;
use crate::core::handle::TaskHandle;
use crate::core::task::{ExecutionEnvironment, TaskId};

/// Errors that can occur when using an [`EnvironmentPool`].
#[derive(Debug)]
pub enum PoolError {
    /// The pool has been shut down.
    PoolShutdown,

    /// Configuration validation failed.
    InvalidConfig(String),

    /// Internal error (worker spawn failure, channel closed, etc.).
    Internal(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolShutdown => write!(f, "pool has been shut down"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,

    /// Currently executing jobs.
    pub active_tasks: u64,

    /// Jobs waiting in the channel.
    pub queued_tasks: u64,

    /// Total jobs submitted.
    pub submitted_tasks: u64,

    /// Total jobs that returned normally.
    pub completed_tasks: u64,

    /// Total jobs that panicked.
    pub failed_tasks: u64,

    /// Total jobs skipped because their handle was canceled.
    pub canceled_tasks: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_tasks: AtomicU64,
    pub queued_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub canceled_tasks: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            canceled_tasks: self.canceled_tasks.load(Ordering::Relaxed),
        }
    }
}

/// How a pool job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job returned normally.
    Completed,
    /// The job panicked with this message.
    Failed(String),
    /// The job was skipped because its handle was canceled first.
    Canceled,
}

type CompletionFn = Box<dyn FnOnce(JobOutcome) + Send + 'static>;

/// A job submitted to a pool.
pub struct PoolJob {
    task_id: TaskId,
    handle: TaskHandle,
    run: Box<dyn FnOnce() + Send + 'static>,
    on_complete: Option<CompletionFn>,
}

impl PoolJob {
    /// Wrap a closure as a job tracked by `handle`.
    pub fn new<F>(task_id: impl Into<TaskId>, handle: TaskHandle, run: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            task_id: task_id.into(),
            handle,
            run: Box::new(run),
            on_complete: None,
        }
    }

    /// Register a callback invoked on the worker thread once the job ends.
    #[must_use]
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(JobOutcome) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Id of the task this job runs.
    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl fmt::Debug for PoolJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolJob")
            .field("task_id", &self.task_id)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Pool of dedicated OS threads serving one execution environment.
pub struct EnvironmentPool {
    environment: ExecutionEnvironment,
    worker_count: usize,
    shutdown_timeout: Duration,

    /// Job sender. Option allows clean shutdown by dropping.
    job_tx: Mutex<Option<Sender<PoolJob>>>,

    counters: Arc<PoolCounters>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl EnvironmentPool {
    /// Spawn `config.worker_count` threads named `mapcore-<env>-<n>`.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if the configuration is invalid
    /// - `PoolError::Internal` if a worker thread cannot be spawned
    pub fn new(
        environment: ExecutionEnvironment,
        config: &PoolConfig,
        hooks: Option<Arc<dyn WorkerThreadHooks>>,
    ) -> Result<Self, PoolError> {
        if environment == ExecutionEnvironment::Graphics {
            return Err(PoolError::InvalidConfig(
                "graphics tasks run on the render thread, not a pool".into(),
            ));
        }
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (job_tx, job_rx) = unbounded::<PoolJob>();
        let counters = Arc::new(PoolCounters::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let spawned = spawn_worker(
                environment,
                worker_id,
                job_rx.clone(),
                Arc::clone(&counters),
                Arc::clone(&shutdown),
                hooks.clone(),
                config.thread_stack_size,
            );
            match spawned {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    // Workers already running exit once the sender is dropped.
                    shutdown.store(true, Ordering::Release);
                    drop(job_tx);
                    return Err(PoolError::Internal(format!(
                        "failed to spawn {environment} worker {worker_id}: {e}"
                    )));
                }
            }
        }

        info!(
            environment = %environment,
            worker_count = config.worker_count,
            "environment pool initialized"
        );

        Ok(Self {
            environment,
            worker_count: config.worker_count,
            shutdown_timeout: config.shutdown_timeout(),
            job_tx: Mutex::new(Some(job_tx)),
            counters,
            shutdown,
            workers: Mutex::new(workers),
        })
    }

    /// Environment this pool serves.
    #[must_use]
    pub const fn environment(&self) -> ExecutionEnvironment {
        self.environment
    }

    /// Enqueue a job. Never blocks.
    ///
    /// # Errors
    ///
    /// `PoolError::PoolShutdown` if the pool has been shut down; the job is
    /// dropped without running its completion callback.
    pub fn submit(&self, job: PoolJob) -> Result<(), PoolError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        let job_tx = self.job_tx.lock();
        let Some(job_tx) = job_tx.as_ref() else {
            return Err(PoolError::PoolShutdown);
        };

        // Count before sending so a fast worker never decrements below zero.
        self.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);
        let task_id = job.task_id.clone();
        if job_tx.send(job).is_err() {
            self.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
            return Err(PoolError::PoolShutdown);
        }
        self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        debug!(environment = %self.environment, task_id = %task_id, "job submitted");
        Ok(())
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.worker_count)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Shut the pool down, joining workers with the configured timeout.
    ///
    /// Jobs still queued are discarded. Workers that don't exit within the
    /// timeout are detached, and a worker calling this on its own pool is
    /// never joined.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!(environment = %self.environment, "shutting down environment pool");

        // Drop the sender to unblock all workers waiting on recv()
        self.job_tx.lock().take();

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let worker_count = workers.len();
        let current = thread::current().id();

        for (idx, worker) in workers.into_iter().enumerate() {
            if worker.thread().id() == current {
                debug!(worker_id = idx, "shutdown called from this worker; detaching it");
                continue;
            }

            let (tx, rx) = crossbeam_channel::bounded(1);
            let join_thread = thread::spawn(move || {
                let result = worker.join();
                let _ = tx.send(result.is_ok());
            });

            match rx.recv_timeout(self.shutdown_timeout) {
                Ok(true) => debug!(worker_id = idx, "worker joined"),
                Ok(false) => warn!(worker_id = idx, "worker panicked"),
                Err(_) => {
                    warn!(worker_id = idx, "worker did not exit within timeout; detaching");
                    continue;
                }
            }
            let _ = join_thread.join();
        }

        info!(
            environment = %self.environment,
            worker_count = worker_count,
            "environment pool shut down"
        );
    }
}

impl fmt::Debug for EnvironmentPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentPool")
            .field("environment", &self.environment)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Drop for EnvironmentPool {
    fn drop(&mut self) {
        // Signal only; explicit shutdown() is required to join.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.job_tx.lock().take();
            debug!(
                environment = %self.environment,
                "pool dropped without explicit shutdown; workers will be detached"
            );
        }
    }
}

fn spawn_worker(
    environment: ExecutionEnvironment,
    worker_id: usize,
    job_rx: Receiver<PoolJob>,
    counters: Arc<PoolCounters>,
    shutdown: Arc<AtomicBool>,
    hooks: Option<Arc<dyn WorkerThreadHooks>>,
    stack_size: usize,
) -> std::io::Result<JoinHandle<()>> {
    let name = format!("mapcore-{environment}-{worker_id}");
    thread::Builder::new()
        .name(name.clone())
        .stack_size(stack_size)
        .spawn(move || {
            if let Some(hooks) = &hooks {
                hooks.on_thread_start(&name);
            }
            debug!(environment = %environment, worker_id, "worker thread started");

            // Blocks until a job arrives or every sender is gone.
            while let Ok(job) = job_rx.recv() {
                counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                if shutdown.load(Ordering::Acquire) {
                    debug!(environment = %environment, worker_id, "pool shut down; exiting");
                    break;
                }
                run_job(environment, worker_id, job, &counters);
            }

            debug!(environment = %environment, worker_id, "worker thread exiting");
            if let Some(hooks) = &hooks {
                hooks.on_thread_stop(&name);
            }
        })
}

fn run_job(environment: ExecutionEnvironment, worker_id: usize, job: PoolJob, counters: &PoolCounters) {
    let PoolJob {
        task_id,
        handle,
        run,
        on_complete,
    } = job;

    let outcome = if handle.is_canceled() {
        counters.canceled_tasks.fetch_add(1, Ordering::Relaxed);
        debug!(environment = %environment, worker_id, task_id = %task_id, "skipping canceled job");
        JobOutcome::Canceled
    } else {
        counters.active_tasks.fetch_add(1, Ordering::Relaxed);
        let result = catch_unwind(AssertUnwindSafe(run));
        counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
        match result {
            Ok(()) => {
                counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
                JobOutcome::Completed
            }
            Err(payload) => {
                counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                let err = TaskExecutionError {
                    task_id,
                    environment,
                    message: panic_message(payload.as_ref()),
                };
                error!(worker_id, error = %err, "task panicked");
                JobOutcome::Failed(err.message)
            }
        }
    };

    if let Some(callback) = on_complete {
        callback(outcome);
    }
}

/// The three pooled environments, one [`EnvironmentPool`] each.
#[derive(Debug)]
pub struct EnvironmentPools {
    io: EnvironmentPool,
    computation: EnvironmentPool,
    default: EnvironmentPool,
}

impl EnvironmentPools {
    /// Spawn every pool described by `config`.
    ///
    /// # Errors
    ///
    /// Fails on the first pool that cannot be created; pools already created
    /// are signaled to stop.
    pub fn new(
        config: &SchedulerConfig,
        hooks: Option<Arc<dyn WorkerThreadHooks>>,
    ) -> Result<Self, PoolError> {
        Ok(Self {
            io: EnvironmentPool::new(ExecutionEnvironment::Io, &config.io, hooks.clone())?,
            computation: EnvironmentPool::new(
                ExecutionEnvironment::Computation,
                &config.computation,
                hooks.clone(),
            )?,
            default: EnvironmentPool::new(ExecutionEnvironment::Default, &config.default, hooks)?,
        })
    }

    /// Pool serving `environment`; `None` for graphics.
    #[must_use]
    pub const fn pool_for(&self, environment: ExecutionEnvironment) -> Option<&EnvironmentPool> {
        match environment {
            ExecutionEnvironment::Io => Some(&self.io),
            ExecutionEnvironment::Computation => Some(&self.computation),
            ExecutionEnvironment::Default => Some(&self.default),
            ExecutionEnvironment::Graphics => None,
        }
    }

    /// Statistics of the pool serving `environment`.
    #[must_use]
    pub fn stats(&self, environment: ExecutionEnvironment) -> Option<PoolStats> {
        self.pool_for(environment).map(EnvironmentPool::stats)
    }

    /// Shut every pool down.
    pub fn shutdown(&self) {
        self.io.shutdown();
        self.computation.shutdown();
        self.default.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn small_config(workers: usize) -> PoolConfig {
        PoolConfig::new()
            .with_worker_count(workers)
            .with_shutdown_timeout_ms(500)
    }

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_pool_error_display() {
        assert_eq!(PoolError::PoolShutdown.to_string(), "pool has been shut down");
        assert_eq!(
            PoolError::InvalidConfig("worker_count".into()).to_string(),
            "invalid configuration: worker_count"
        );
    }

    #[test]
    fn test_pool_counters_snapshot() {
        let counters = PoolCounters::default();
        counters.submitted_tasks.fetch_add(10, Ordering::Relaxed);
        counters.completed_tasks.fetch_add(5, Ordering::Relaxed);
        counters.canceled_tasks.fetch_add(2, Ordering::Relaxed);

        let stats = counters.snapshot(4);
        assert_eq!(stats.worker_count, 4);
        assert_eq!(stats.submitted_tasks, 10);
        assert_eq!(stats.completed_tasks, 5);
        assert_eq!(stats.canceled_tasks, 2);
    }

    #[test]
    fn test_rejects_graphics_environment() {
        let err = EnvironmentPool::new(ExecutionEnvironment::Graphics, &small_config(1), None)
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig(_)));
    }

    #[test]
    fn test_runs_jobs_and_reports_outcome() {
        let pool = EnvironmentPool::new(ExecutionEnvironment::Io, &small_config(2), None).unwrap();
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let outcomes = Arc::clone(&outcomes);
            let job = PoolJob::new(format!("job-{i}"), TaskHandle::new(i), || {})
                .on_complete(move |outcome| outcomes.lock().push(outcome));
            pool.submit(job).unwrap();
        }
        assert!(wait_for(|| outcomes.lock().len() == 4));
        assert!(outcomes.lock().iter().all(|o| *o == JobOutcome::Completed));
        assert_eq!(pool.stats().completed_tasks, 4);
        pool.shutdown();
    }

    #[test]
    fn test_panic_does_not_kill_worker() {
        let pool =
            EnvironmentPool::new(ExecutionEnvironment::Computation, &small_config(1), None).unwrap();
        let outcome = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&outcome);
        pool.submit(
            PoolJob::new("bad", TaskHandle::new(0), || panic!("decode failed"))
                .on_complete(move |o| *slot.lock() = Some(o)),
        )
        .unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        pool.submit(PoolJob::new("good", TaskHandle::new(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        assert!(wait_for(|| ran.load(Ordering::SeqCst) == 1));
        assert_eq!(
            *outcome.lock(),
            Some(JobOutcome::Failed("decode failed".into()))
        );
        assert_eq!(pool.stats().failed_tasks, 1);
        pool.shutdown();
    }

    #[test]
    fn test_canceled_job_is_skipped() {
        let pool = EnvironmentPool::new(ExecutionEnvironment::Default, &small_config(1), None).unwrap();
        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock();

        // Occupy the only worker so the next job stays queued.
        let blocker_gate = Arc::clone(&gate);
        pool.submit(PoolJob::new("blocker", TaskHandle::new(0), move || {
            let _g = blocker_gate.lock();
        }))
        .unwrap();

        let handle = TaskHandle::new(1);
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        pool.submit(PoolJob::new("victim", handle.clone(), move || {
            flag.store(true, Ordering::SeqCst);
        }))
        .unwrap();
        handle.cancel();
        drop(held);

        assert!(wait_for(|| pool.stats().canceled_tasks == 1));
        assert!(!ran.load(Ordering::SeqCst));
        pool.shutdown();
    }

    #[test]
    fn test_submit_after_shutdown() {
        let pool = EnvironmentPool::new(ExecutionEnvironment::Io, &small_config(1), None).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_shutdown());
        let err = pool.submit(PoolJob::new("late", TaskHandle::new(0), || {})).unwrap_err();
        assert!(matches!(err, PoolError::PoolShutdown));
    }

    #[test]
    fn test_thread_hooks_run_per_worker() {
        #[derive(Default)]
        struct CountingHooks {
            started: AtomicUsize,
            stopped: AtomicUsize,
        }
        impl WorkerThreadHooks for CountingHooks {
            fn on_thread_start(&self, thread_name: &str) {
                assert!(thread_name.starts_with("mapcore-io-"));
                self.started.fetch_add(1, Ordering::SeqCst);
            }
            fn on_thread_stop(&self, _thread_name: &str) {
                self.stopped.fetch_add(1, Ordering::SeqCst);
            }
        }

        let hooks = Arc::new(CountingHooks::default());
        let dyn_hooks: Arc<dyn WorkerThreadHooks> = hooks.clone();
        let pool =
            EnvironmentPool::new(ExecutionEnvironment::Io, &small_config(3), Some(dyn_hooks)).unwrap();
        assert!(wait_for(|| hooks.started.load(Ordering::SeqCst) == 3));
        pool.shutdown();
        assert_eq!(hooks.stopped.load(Ordering::SeqCst), 3);
    }
}
