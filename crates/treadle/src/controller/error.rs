//! Error surface of the lifecycle controller.

use thiserror::Error;

use super::Lifecycle;
use crate::BoxError;
use crate::events::{EventError, Phase};
use crate::operation::OperationError;
use crate::service::ServiceError;

/// Errors raised by [`DaemonController`](super::DaemonController).
#[derive(Debug, Error)]
pub enum ControllerError {
    /// `start` was requested while the service reports the daemon running.
    #[error("daemon '{daemon}' is already running")]
    AlreadyRunning {
        /// Daemon command name.
        daemon: String,
    },
    /// `stop` or `restart` was requested while the daemon is stopped.
    #[error("daemon '{daemon}' is not running")]
    NotRunning {
        /// Daemon command name.
        daemon: String,
    },
    /// A lifecycle operation was requested while another one was active.
    #[error("cannot {requested} while {active} is in progress")]
    Reentrant {
        /// Operation that was refused.
        requested: Lifecycle,
        /// Operation already on the stack.
        active: Lifecycle,
    },
    /// The process daemon service failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// A hook returned an error.
    #[error("{phase} hook '{name}' failed: {source}")]
    Hook {
        /// Phase being dispatched.
        phase: Phase,
        /// Name of the failing hook.
        name: String,
        /// Error returned by the hook.
        #[source]
        source: BoxError,
    },
    /// The daemon's unit of work returned an error.
    #[error("daemon work failed in cycle {cycle}: {source}")]
    Work {
        /// One-based number of the failing cycle.
        cycle: u64,
        /// Error returned by the work unit.
        #[source]
        source: BoxError,
    },
    /// Hook registration failed.
    #[error(transparent)]
    Event(#[from] EventError),
    /// Operation registration or lookup failed.
    #[error(transparent)]
    Operation(#[from] OperationError),
}
