//! Fluent construction of a [`Scheduler`].

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{AuditSink, GraphicsTaskSink, Scheduler, SchedulerError, WorkerThreadHooks};
use crate::infra::DelayTimer;

use super::pool_builder::build_pools;

/// Name of the delay timer thread.
pub const TIMER_THREAD_NAME: &str = "mapcore-timer";

/// Builder for [`Scheduler`].
///
/// ```rust,ignore
/// let audit = Arc::new(InMemoryAuditSink::new(1_000));
/// let scheduler = SchedulerBuilder::new(SchedulerConfig::from_env()?)
///     .with_audit_sink(audit.clone())
///     .build()?;
/// scheduler.resume();
/// ```
#[must_use]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    audit: Option<Arc<dyn AuditSink>>,
    hooks: Option<Arc<dyn WorkerThreadHooks>>,
    graphics_sink: Option<Arc<dyn GraphicsTaskSink>>,
}

impl SchedulerBuilder {
    /// Start from a configuration.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            audit: None,
            hooks: None,
            graphics_sink: None,
        }
    }

    /// Report task lifecycle events to `sink`.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Run `hooks` on every pool worker thread start and stop.
    pub fn with_thread_hooks(mut self, hooks: Arc<dyn WorkerThreadHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Bind the graphics channel up front.
    pub fn with_graphics_sink(mut self, sink: Arc<dyn GraphicsTaskSink>) -> Self {
        self.graphics_sink = Some(sink);
        self
    }

    /// Spawn the pools and the delay timer.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or a thread cannot be spawned.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        let pools = build_pools(&self.config, self.hooks)?;
        let timer = match DelayTimer::new(TIMER_THREAD_NAME) {
            Ok(timer) => timer,
            Err(e) => {
                pools.shutdown();
                return Err(e);
            }
        };
        Ok(Scheduler::from_parts(
            self.config,
            pools,
            timer,
            self.audit,
            self.graphics_sink,
        ))
    }
}
