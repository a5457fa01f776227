use nix::sys::resource::{Resource, getrlimit, setrlimit};
use tracing::info;
use treadle_config::ResourceLimits;

use super::SERVICE_TARGET;
use crate::service::ServiceError;

/// Lowers the soft address space and CPU time limits of this process.
///
/// Requested values above the hard limit are clamped to it.
pub(super) fn apply(limits: &ResourceLimits) -> Result<(), ServiceError> {
    if let Some(bytes) = limits.memory.bytes() {
        lower_soft_limit(Resource::RLIMIT_AS, "address space", bytes)?;
    }
    if let Some(cpu) = limits.max_execution_time {
        lower_soft_limit(Resource::RLIMIT_CPU, "cpu time", cpu.as_secs())?;
    }
    Ok(())
}

fn lower_soft_limit(
    resource: Resource,
    label: &'static str,
    requested: u64,
) -> Result<(), ServiceError> {
    let map_err = |source| ServiceError::ResourceLimit {
        resource: label,
        source,
    };
    let (_, hard) = getrlimit(resource).map_err(map_err)?;
    let soft = requested.min(hard);
    setrlimit(resource, soft, hard).map_err(map_err)?;
    info!(
        target: SERVICE_TARGET,
        resource = label,
        soft,
        "resource limit applied"
    );
    Ok(())
}
