use std::fs::{self, File, OpenOptions};
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use camino::Utf8Path;
use serde::Serialize;
use tracing::{info, warn};

use super::SERVICE_TARGET;
use super::files::replace_file;
use super::paths::ServicePaths;
use super::liveness::{process_alive, read_pid};
use crate::service::ServiceError;

/// Owns the lock, PID, and health files of a running daemon and removes them
/// when dropped.
#[derive(Debug)]
pub(super) struct ProcessGuard {
    paths: ServicePaths,
    _lock: File,
    pid: Option<u32>,
}

impl ProcessGuard {
    pub(super) fn acquire(paths: ServicePaths) -> Result<Self, ServiceError> {
        let lock = acquire_lock(&paths)?;
        Ok(Self {
            paths,
            _lock: lock,
            pid: None,
        })
    }

    pub(super) fn write_pid(&mut self, pid: u32) -> Result<(), ServiceError> {
        let path = self.paths.pid_path();
        replace_file(path, format!("{pid}\n").as_bytes()).map_err(|source| {
            ServiceError::PidWrite {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.pid = Some(pid);
        info!(
            target: SERVICE_TARGET,
            pid,
            file = %path,
            "pid file written"
        );
        Ok(())
    }

    pub(super) fn write_health(&self, status: HealthState) -> Result<(), ServiceError> {
        let pid = self.pid.ok_or(ServiceError::MissingPid)?;
        let path = self.paths.health_path();
        let snapshot = HealthSnapshot::new(status, pid)?;
        let mut payload = serde_json::to_vec(&snapshot)?;
        payload.push(b'\n');
        replace_file(path, &payload).map_err(|source| ServiceError::HealthWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            target: SERVICE_TARGET,
            status = snapshot.status,
            file = %path,
            "health snapshot updated"
        );
        Ok(())
    }

    pub(super) const fn paths(&self) -> &ServicePaths {
        &self.paths
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        for (path, label) in [
            (self.paths.health_path(), "health"),
            (self.paths.pid_path(), "pid"),
            (self.paths.lock_path(), "lock"),
        ] {
            if let Err(error) = fs::remove_file(path)
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: SERVICE_TARGET,
                    file = %path,
                    %error,
                    "failed to remove {label} file"
                );
            }
        }
    }
}

/// Lifecycle states recorded in the health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum HealthState {
    Running,
    Stopping,
}

impl HealthState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthSnapshot {
    status: &'static str,
    pid: u32,
    timestamp: u64,
}

impl HealthSnapshot {
    fn new(state: HealthState, pid: u32) -> Result<Self, ServiceError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|source| ServiceError::Clock { source })?
            .as_secs();
        Ok(Self {
            status: state.as_str(),
            pid,
            timestamp,
        })
    }
}

fn acquire_lock(paths: &ServicePaths) -> Result<File, ServiceError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    match options.open(paths.lock_path()) {
        Ok(file) => {
            info!(
                target: SERVICE_TARGET,
                file = %paths.lock_path(),
                "acquired daemon lock"
            );
            Ok(file)
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => handle_existing_lock(paths),
        Err(source) => Err(ServiceError::LockCreate {
            path: paths.lock_path().to_path_buf(),
            source,
        }),
    }
}

fn handle_existing_lock(paths: &ServicePaths) -> Result<File, ServiceError> {
    if let Some(pid) = read_pid(paths.pid_path()) {
        if process_alive(pid)? {
            info!(
                target: SERVICE_TARGET,
                pid,
                "refusing to start: existing daemon alive"
            );
            return Err(ServiceError::AlreadyRunning { pid });
        }
        warn!(
            target: SERVICE_TARGET,
            pid,
            "existing daemon not detected; cleaning stale files"
        );
    }
    remove_stale(paths.lock_path())?;
    remove_stale(paths.pid_path())?;
    remove_stale(paths.health_path())?;
    acquire_lock(paths)
}

fn remove_stale(path: &Utf8Path) -> Result<(), ServiceError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ServiceError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}
