//! Builders to construct environment pools from configuration.

use std::sync::Arc;

use tracing::debug;

use crate::config::SchedulerConfig;
use crate::core::{EnvironmentPools, SchedulerError, WorkerThreadHooks};

/// Build the IO, Computation and Default pools described by `cfg`.
///
/// # Errors
///
/// `SchedulerError::InvalidConfig` if validation fails, `SchedulerError::Pool`
/// if a pool cannot spawn its workers.
pub fn build_pools(
    cfg: &SchedulerConfig,
    hooks: Option<Arc<dyn WorkerThreadHooks>>,
) -> Result<EnvironmentPools, SchedulerError> {
    cfg.validate()
        .map_err(|e| SchedulerError::InvalidConfig(format!("config invalid: {e}")))?;

    let pools = EnvironmentPools::new(cfg, hooks)?;
    debug!(
        io = cfg.io.worker_count,
        computation = cfg.computation.worker_count,
        default = cfg.default.worker_count,
        "environment pools built"
    );
    Ok(pools)
}
