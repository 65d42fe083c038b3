//! Pool and scheduler configuration structures.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::error::AppResult;
use crate::core::task::ExecutionEnvironment;

/// Threads dedicated to blocking I/O when nothing else is configured.
pub const DEFAULT_IO_WORKERS: usize = 8;
/// Graphics tasks run per [`run_graphics_tasks`](crate::core::Scheduler::run_graphics_tasks) call.
pub const DEFAULT_GRAPHICS_BATCH_LIMIT: usize = 8;
/// Time budget for one [`run_graphics_tasks`](crate::core::Scheduler::run_graphics_tasks) call.
pub const DEFAULT_GRAPHICS_TIME_BUDGET_MS: u64 = 4;

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of dedicated OS threads.
    pub worker_count: usize,
    /// Stack size of each worker thread in bytes.
    pub thread_stack_size: usize,
    /// How long `shutdown` waits for each worker to exit, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
            thread_stack_size: 2 * 1024 * 1024,
            shutdown_timeout_ms: 2_000,
        }
    }
}

impl PoolConfig {
    /// Create a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the worker stack size in bytes.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the per-worker shutdown join timeout.
    #[must_use]
    pub const fn with_shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.shutdown_timeout_ms = ms;
        self
    }

    /// Join timeout as a duration.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        if self.shutdown_timeout_ms == 0 {
            return Err("shutdown_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pool for [`ExecutionEnvironment::Io`].
    pub io: PoolConfig,
    /// Pool for [`ExecutionEnvironment::Computation`].
    pub computation: PoolConfig,
    /// Pool for [`ExecutionEnvironment::Default`].
    pub default: PoolConfig,
    /// Whether the scheduler accepts work immediately instead of buffering
    /// until the first `resume`.
    pub start_resumed: bool,
    /// Maximum graphics tasks run per fallback drain.
    pub graphics_batch_limit: usize,
    /// Time budget of one fallback drain, in milliseconds.
    pub graphics_time_budget_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            io: PoolConfig::new().with_worker_count(DEFAULT_IO_WORKERS),
            computation: PoolConfig::new(),
            default: PoolConfig::new().with_worker_count(num_cpus::get().max(2)),
            start_resumed: false,
            graphics_batch_limit: DEFAULT_GRAPHICS_BATCH_LIMIT,
            graphics_time_budget_ms: DEFAULT_GRAPHICS_TIME_BUDGET_MS,
        }
    }
}

impl SchedulerConfig {
    /// Pool configuration for a pooled environment; `None` for graphics.
    #[must_use]
    pub const fn pool(&self, environment: ExecutionEnvironment) -> Option<&PoolConfig> {
        match environment {
            ExecutionEnvironment::Io => Some(&self.io),
            ExecutionEnvironment::Computation => Some(&self.computation),
            ExecutionEnvironment::Default => Some(&self.default),
            ExecutionEnvironment::Graphics => None,
        }
    }

    /// Use the same worker count for every pool. Handy in tests.
    #[must_use]
    pub fn with_uniform_workers(mut self, worker_count: usize) -> Self {
        self.io.worker_count = worker_count;
        self.computation.worker_count = worker_count;
        self.default.worker_count = worker_count;
        self
    }

    /// Set whether the scheduler starts resumed.
    #[must_use]
    pub const fn with_start_resumed(mut self, start_resumed: bool) -> Self {
        self.start_resumed = start_resumed;
        self
    }

    /// Fallback drain budget as a duration.
    #[must_use]
    pub const fn graphics_time_budget(&self) -> Duration {
        Duration::from_millis(self.graphics_time_budget_ms)
    }

    /// Validate all pools.
    ///
    /// # Errors
    ///
    /// Returns a description naming the offending pool or field.
    pub fn validate(&self) -> Result<(), String> {
        for env in ExecutionEnvironment::POOLED {
            if let Some(pool) = self.pool(env) {
                pool.validate()
                    .map_err(|e| format!("pool `{env}` invalid: {e}"))?;
            }
        }
        if self.graphics_batch_limit == 0 {
            return Err("graphics_batch_limit must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build a configuration from `MAPCORE_*` environment variables, loading
    /// a `.env` file first if one exists.
    ///
    /// Recognized variables: `MAPCORE_IO_WORKERS`, `MAPCORE_COMPUTATION_WORKERS`,
    /// `MAPCORE_DEFAULT_WORKERS`, `MAPCORE_START_RESUMED`,
    /// `MAPCORE_GRAPHICS_BATCH_LIMIT`, `MAPCORE_GRAPHICS_TIME_BUDGET_MS`.
    ///
    /// # Errors
    ///
    /// Fails if a variable is present but unparsable, or the result is invalid.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Fails if a variable is present but unparsable, or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T, F>(lookup: &F, key: &str) -> AppResult<Option<T>>
        where
            T: std::str::FromStr,
            T::Err: std::error::Error + Send + Sync + 'static,
            F: Fn(&str) -> Option<String>,
        {
            lookup(key)
                .map(|raw| raw.trim().parse::<T>())
                .transpose()
                .with_context(|| format!("invalid value for {key}"))
        }

        let mut cfg = Self::default();
        if let Some(n) = parse(&lookup, "MAPCORE_IO_WORKERS")? {
            cfg.io.worker_count = n;
        }
        if let Some(n) = parse(&lookup, "MAPCORE_COMPUTATION_WORKERS")? {
            cfg.computation.worker_count = n;
        }
        if let Some(n) = parse(&lookup, "MAPCORE_DEFAULT_WORKERS")? {
            cfg.default.worker_count = n;
        }
        if let Some(b) = parse(&lookup, "MAPCORE_START_RESUMED")? {
            cfg.start_resumed = b;
        }
        if let Some(n) = parse(&lookup, "MAPCORE_GRAPHICS_BATCH_LIMIT")? {
            cfg.graphics_batch_limit = n;
        }
        if let Some(n) = parse(&lookup, "MAPCORE_GRAPHICS_TIME_BUDGET_MS")? {
            cfg.graphics_time_budget_ms = n;
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}
