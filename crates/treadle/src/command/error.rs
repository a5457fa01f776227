//! Error surface of the command runner.

use std::sync::Arc;

use thiserror::Error;
use treadle_config::{CatalogueError, ResolveError};

use crate::BoxError;
use crate::controller::ControllerError;
use crate::operation::OperationError;
use crate::service::ServiceError;
use crate::telemetry::TelemetryError;

/// Errors reported by [`Application::run`](super::Application::run).
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration layers could not be loaded or merged.
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    /// Telemetry could not be initialised.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The command line did not parse.
    #[error("{0}")]
    Usage(clap::Error),
    /// The parsed command named no registered daemon.
    #[error("no daemon is registered as '{0}'")]
    UnknownDaemon(String),
    /// The operation argument was missing.
    #[error("an operation must be provided")]
    MissingOperation,
    /// The operation is not permitted for the daemon.
    #[error(transparent)]
    Operation(#[from] OperationError),
    /// The daemon could not be built from its arguments.
    #[error("failed to prepare daemon '{daemon}': {source}")]
    Daemon {
        /// Daemon command name.
        daemon: &'static str,
        /// Error returned by the daemon constructor.
        #[source]
        source: BoxError,
    },
    /// The daemon catalogue could not be read.
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
    /// Daemon options could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The daemon service could not be initialised.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// The lifecycle operation failed.
    #[error(transparent)]
    Controller(#[from] ControllerError),
}
