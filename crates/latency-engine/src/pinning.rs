//! CPU pinning and memory locking for the measuring process.
//!
//! Cycle-counter readings are only comparable on one core, and a page fault
//! inside a measured interval shows up as an outlier sample. Both are
//! optional: operators often pin with `taskset` instead.

use latency_common::config::PinningConfig;
use latency_common::error::{LatencyError, LatencyResult};
use tracing::{debug, info, warn};

/// What pinning actually took effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinningStatus {
    /// Whether memory was locked.
    pub memory_locked: bool,
    /// CPU the process is pinned to.
    pub pinned_cpu: Option<usize>,
}

/// Apply the pinning configuration to the current process.
///
/// Missing privileges (EPERM) and nonexistent CPUs (EINVAL) are logged and
/// skipped rather than failing the run.
///
/// # Errors
///
/// Returns [`LatencyError::Config`] for any other failure.
pub fn apply_pinning(config: &PinningConfig) -> LatencyResult<PinningStatus> {
    let pinned_cpu = match config.cpu_affinity {
        Some(cpu) => pin_to_cpu(cpu)?,
        None => {
            debug!("No CPU affinity configured");
            None
        }
    };

    let memory_locked = if config.lock_memory {
        lock_memory()?
    } else {
        false
    };

    let status = PinningStatus {
        memory_locked,
        pinned_cpu,
    };
    info!(?status, current_cpu = ?current_cpu(), "Process pinning applied");
    Ok(status)
}

#[cfg(target_os = "linux")]
fn pin_to_cpu(cpu: usize) -> LatencyResult<Option<usize>> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut cpu_set = CpuSet::new();
    cpu_set
        .set(cpu)
        .map_err(|e| LatencyError::Config(format!("invalid CPU index {cpu}: {e}")))?;

    affinity_outcome(cpu, sched_setaffinity(Pid::from_raw(0), &cpu_set))
}

#[cfg(target_os = "linux")]
fn affinity_outcome(cpu: usize, result: nix::Result<()>) -> LatencyResult<Option<usize>> {
    use nix::errno::Errno;

    match result {
        Ok(()) => {
            info!(cpu, "Pinned to CPU");
            Ok(Some(cpu))
        }
        Err(Errno::EINVAL) => {
            warn!(cpu, "CPU does not exist or is offline, running unpinned");
            Ok(None)
        }
        Err(Errno::EPERM) => {
            warn!(cpu, "sched_setaffinity failed with EPERM, running unpinned");
            Ok(None)
        }
        Err(e) => Err(LatencyError::Config(format!("sched_setaffinity failed: {e}"))),
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_cpu(cpu: usize) -> LatencyResult<Option<usize>> {
    warn!(cpu, "CPU affinity not available on this platform");
    Ok(None)
}

#[cfg(target_os = "linux")]
fn lock_memory() -> LatencyResult<bool> {
    use nix::sys::mman::{mlockall, MlockAllFlags};

    match mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE) {
        Ok(()) => {
            info!("Memory locked");
            Ok(true)
        }
        Err(nix::errno::Errno::EPERM) => {
            warn!("mlockall failed with EPERM (no CAP_IPC_LOCK); page faults may appear as outliers");
            Ok(false)
        }
        Err(e) => Err(LatencyError::Config(format!("mlockall failed: {e}"))),
    }
}

#[cfg(not(target_os = "linux"))]
fn lock_memory() -> LatencyResult<bool> {
    warn!("mlockall not available on this platform");
    Ok(false)
}

/// CPU the calling thread is running on, if the platform reports it.
#[must_use]
pub fn current_cpu() -> Option<usize> {
    #[cfg(target_os = "linux")]
    {
        nix::sched::sched_getcpu().ok()
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
