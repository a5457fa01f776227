//! Production daemon service: PID and lock files, daemonisation, signals,
//! and resource limits.

mod daemonizer;
mod files;
mod guard;
mod limits;
mod paths;
mod liveness;
mod signals;

use std::env;
use std::ffi::OsStr;
use std::process;
use std::time::Duration;

use tracing::{debug, info, warn};
use treadle_config::DaemonOptions;

pub use daemonizer::{Daemonizer, SystemDaemonizer};
pub use signals::ShutdownHandle;

use guard::{HealthState, ProcessGuard};
use paths::ServicePaths;
use signals::SignalFlags;

use super::{DaemonService, ServiceError};

pub(crate) const SERVICE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::service");
const FOREGROUND_ENV_VAR: &str = "TREADLE_FOREGROUND";

/// Default time allowed for a remote daemon to exit after `SIGTERM`.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Launch mode for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    Background,
    /// Remain attached to the terminal; used for debugging, supervisors, and
    /// tests.
    Foreground,
}

impl LaunchMode {
    /// Selects foreground mode when `TREADLE_FOREGROUND` is set.
    #[must_use]
    pub fn detect() -> Self {
        Self::from_foreground_flag(env::var_os(FOREGROUND_ENV_VAR).as_deref())
    }

    /// Any value of the foreground flag, even an empty one, selects
    /// foreground mode.
    pub(crate) const fn from_foreground_flag(flag: Option<&OsStr>) -> Self {
        match flag {
            Some(_) => Self::Foreground,
            None => Self::Background,
        }
    }
}

struct Prepared {
    options: DaemonOptions,
    paths: ServicePaths,
}

struct Owned {
    guard: ProcessGuard,
    _signals: SignalFlags,
}

/// [`DaemonService`] backed by the operating system.
///
/// The process that calls [`start`](DaemonService::start) owns the daemon
/// and reports it running until a termination signal arrives or
/// [`ShutdownHandle::request`] is called. Any other process observes the
/// daemon through its PID file.
pub struct SystemDaemonService<Z = SystemDaemonizer> {
    mode: LaunchMode,
    daemonizer: Z,
    shutdown: ShutdownHandle,
    shutdown_timeout: Duration,
    prepared: Option<Prepared>,
    owned: Option<Owned>,
}

impl SystemDaemonService {
    /// Builds a service using `daemonize-me` for background launches.
    #[must_use]
    pub fn new(mode: LaunchMode) -> Self {
        Self::with_daemonizer(mode, SystemDaemonizer::new())
    }

    /// Builds a service whose launch mode follows `TREADLE_FOREGROUND`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(LaunchMode::detect())
    }
}

impl<Z: Daemonizer> SystemDaemonService<Z> {
    /// Builds a service with a custom daemoniser.
    #[must_use]
    pub fn with_daemonizer(mode: LaunchMode, daemonizer: Z) -> Self {
        Self {
            mode,
            daemonizer,
            shutdown: ShutdownHandle::new(),
            shutdown_timeout: SHUTDOWN_TIMEOUT,
            prepared: None,
            owned: None,
        }
    }

    /// Overrides how long a remote stop waits for the daemon to exit.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Handle that requests shutdown of the daemon owned by this process.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Launch mode in effect.
    #[must_use]
    pub const fn mode(&self) -> LaunchMode {
        self.mode
    }

    /// Returns `true` while this process owns the running daemon.
    #[must_use]
    pub const fn owns_daemon(&self) -> bool {
        self.owned.is_some()
    }

    fn prepared(&self) -> Result<&Prepared, ServiceError> {
        self.prepared.as_ref().ok_or(ServiceError::NotInitialised)
    }

    fn stop_owned(&mut self, owned: Owned) {
        if let Err(error) = owned.guard.write_health(HealthState::Stopping) {
            warn!(
                target: SERVICE_TARGET,
                %error,
                "failed to record stopping state"
            );
        }
        info!(
            target: SERVICE_TARGET,
            pid = process::id(),
            "releasing daemon runtime files"
        );
        drop(owned);
        self.shutdown.reset();
    }

    fn stop_remote(&self) -> Result<(), ServiceError> {
        let prepared = self.prepared()?;
        let pid_path = prepared.paths.pid_path();
        let Some(pid) = liveness::read_pid(pid_path) else {
            return Err(ServiceError::NotRunning {
                pid_path: pid_path.to_path_buf(),
            });
        };
        if !liveness::process_alive(pid)? {
            return Err(ServiceError::NotRunning {
                pid_path: pid_path.to_path_buf(),
            });
        }
        info!(
            target: SERVICE_TARGET,
            pid,
            timeout_ms = self.shutdown_timeout.as_millis(),
            "sending SIGTERM to running daemon"
        );
        liveness::terminate(pid)?;
        liveness::wait_for_exit(pid_path, pid, self.shutdown_timeout)
    }
}

impl<Z: Daemonizer> DaemonService for SystemDaemonService<Z> {
    fn initialize(&mut self, options: &DaemonOptions) -> Result<(), ServiceError> {
        let paths = ServicePaths::prepare(options)?;
        debug!(
            target: SERVICE_TARGET,
            daemon = %options.process_name,
            runtime = %paths.runtime_dir(),
            pid_file = %paths.pid_path(),
            log_file = %paths.log_path(),
            "daemon service initialised"
        );
        self.prepared = Some(Prepared {
            options: options.clone(),
            paths,
        });
        Ok(())
    }

    fn is_running(&self) -> Result<bool, ServiceError> {
        if self.owned.is_some() {
            return Ok(!self.shutdown.is_requested());
        }
        let prepared = self.prepared()?;
        match liveness::read_pid(prepared.paths.pid_path()) {
            Some(pid) => liveness::process_alive(pid),
            None => Ok(false),
        }
    }

    fn start(&mut self) -> Result<(), ServiceError> {
        if self.owned.is_some() {
            return Err(ServiceError::AlreadyRunning { pid: process::id() });
        }
        let Prepared { options, paths } = self.prepared()?;
        let mut guard = ProcessGuard::acquire(paths.clone())?;
        if matches!(self.mode, LaunchMode::Background) {
            if let Some(run_as) = options.run_as {
                paths.hand_over(run_as)?;
            }
            self.daemonizer.daemonize(options, paths.log_path())?;
            limits::apply(&options.limits)?;
        } else {
            debug!(
                target: SERVICE_TARGET,
                "foreground launch; resource limits and identity left unchanged"
            );
        }
        guard.write_pid(process::id())?;
        self.shutdown.reset();
        let signals = SignalFlags::install(&self.shutdown)?;
        guard.write_health(HealthState::Running)?;
        info!(
            target: SERVICE_TARGET,
            daemon = %options.process_name,
            description = %options.description,
            author = options.author.as_deref(),
            mode = ?self.mode(),
            pid = process::id(),
            lock = %guard.paths().lock_path(),
            "daemon started"
        );
        self.owned = Some(Owned {
            guard,
            _signals: signals,
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ServiceError> {
        match self.owned.take() {
            Some(owned) => {
                self.stop_owned(owned);
                Ok(())
            }
            None => self.stop_remote(),
        }
    }

    fn restart(&mut self) -> Result<(), ServiceError> {
        self.stop()?;
        self.start()
    }

    fn request_shutdown(&mut self) {
        self.shutdown.request();
    }
}
