//! Error surface of the process daemon service.

use std::io;
use std::time::{Duration, SystemTimeError};

use camino::Utf8PathBuf;
use nix::errno::Errno;
use thiserror::Error;

/// Errors raised by [`DaemonService`](super::DaemonService) implementations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A transition was requested before `initialize`.
    #[error("daemon service used before initialisation")]
    NotInitialised,
    /// The runtime directory could not be created.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The runtime directory could not be handed to the run-as identity.
    #[error("failed to hand runtime directory '{path}' to the run-as identity: {source}")]
    RuntimeOwnership {
        /// Runtime directory.
        path: Utf8PathBuf,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// The PID location has no parent directory.
    #[error("pid file '{path}' has no parent directory")]
    MissingPidParent {
        /// Configured PID file path.
        path: Utf8PathBuf,
    },
    /// Lock file creation failed.
    #[error("failed to create lock file '{path}': {source}")]
    LockCreate {
        /// Lock file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A live process already owns the daemon.
    #[error("daemon already running with pid {pid}")]
    AlreadyRunning {
        /// PID recorded in the existing PID file.
        pid: u32,
    },
    /// No running daemon was found to stop.
    #[error("no running daemon recorded in '{pid_path}'")]
    NotRunning {
        /// PID file that was inspected.
        pid_path: Utf8PathBuf,
    },
    /// Removing a stale runtime artefact failed.
    #[error("failed to remove stale file '{path}': {source}")]
    Cleanup {
        /// Path of the artefact that could not be removed.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the PID file failed.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        /// PID file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the health snapshot failed.
    #[error("failed to write health snapshot '{path}': {source}")]
    HealthWrite {
        /// Health file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Serialising the health snapshot failed.
    #[error("failed to serialise health snapshot: {source}")]
    HealthSerialise {
        /// Underlying serialisation error.
        #[from]
        source: serde_json::Error,
    },
    /// Obtaining the current timestamp failed.
    #[error("failed to read system time: {source}")]
    Clock {
        /// Underlying system time error.
        #[source]
        source: SystemTimeError,
    },
    /// Health updates were attempted before writing the PID file.
    #[error("pid must be written before updating health state")]
    MissingPid,
    /// Probing a recorded PID failed.
    #[error("failed to check process {pid}: {source}")]
    CheckProcess {
        /// PID whose liveness check failed.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Sending a termination signal failed.
    #[error("failed to signal daemon pid {pid}: {source}")]
    Signal {
        /// PID that was signalled.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// The remote daemon did not exit in time.
    #[error("daemon did not stop within {} ms; check '{pid_path}'", timeout.as_millis())]
    ShutdownTimeout {
        /// PID file that was still present.
        pid_path: Utf8PathBuf,
        /// Time waited before giving up.
        timeout: Duration,
    },
    /// Installing the shutdown signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    SignalHandlers {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Detaching into the background failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemonisation error.
        #[source]
        source: DaemonizeError,
    },
    /// Applying a resource limit failed.
    #[error("failed to apply {resource} limit: {source}")]
    ResourceLimit {
        /// Name of the limited resource.
        resource: &'static str,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
}

/// Errors surfaced by the daemonisation backend.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// Opening the daemon log file failed.
    #[error("failed to open log file '{path}': {source}")]
    LogFile {
        /// Log file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// System-level daemonisation failed.
    #[error("{0}")]
    System(#[from] daemonize_me::DaemonError),
}

impl From<DaemonizeError> for ServiceError {
    fn from(source: DaemonizeError) -> Self {
        Self::Daemonize { source }
    }
}
