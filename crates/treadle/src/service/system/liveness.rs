//! PID file inspection and signalling of daemons owned by other processes.

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::debug;

use super::SERVICE_TARGET;
use crate::service::ServiceError;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Reads the PID recorded at `path`, ignoring missing or malformed files.
pub(super) fn read_pid(path: &Utf8Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok().filter(|pid| *pid != 0)
}

/// Reports whether `pid` names a live process.
///
/// A process owned by another user still counts as alive.
pub(super) fn process_alive(pid: u32) -> Result<bool, ServiceError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    if raw == 0 {
        return Ok(false);
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH | Errno::ECHILD) => Ok(false),
        Err(errno) => Err(ServiceError::CheckProcess { pid, source: errno }),
    }
}

/// Sends `SIGTERM` to `pid`.
pub(super) fn terminate(pid: u32) -> Result<(), ServiceError> {
    let raw = i32::try_from(pid).map_err(|_| ServiceError::Signal {
        pid,
        source: Errno::ESRCH,
    })?;
    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|source| ServiceError::Signal { pid, source })
}

/// Waits until the PID file disappears or `pid` exits.
pub(super) fn wait_for_exit(
    pid_path: &Utf8Path,
    pid: u32,
    timeout: Duration,
) -> Result<(), ServiceError> {
    let deadline = Instant::now() + timeout;
    loop {
        if !pid_path.exists() || !process_alive(pid)? {
            debug!(target: SERVICE_TARGET, pid, "remote daemon exited");
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ServiceError::ShutdownTimeout {
                pid_path: pid_path.to_path_buf(),
                timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}
