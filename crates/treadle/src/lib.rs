//! Lifecycle controller and event hooks for long-running daemons.
//!
//! A [`Daemon`] supplies one unit of work. A [`DaemonController`] drives it
//! through `start`, `stop` and `restart` against an injected
//! [`DaemonService`], repeating the work while the service reports the daemon
//! running:
//!
//! ```text
//! service.start -> START -> (CYCLE_START -> work -> CYCLE_END)* -> STOP -> service.stop
//! ```
//!
//! Collaborators observe those transitions by registering named hooks in the
//! controller's [`EventRegistry`]. Within a phase hooks run in registration
//! order; re-registering a name replaces the hook in place.
//!
//! The controller never forks or traps signals. [`SystemDaemonService`] owns
//! those mechanics: PID and lock files, daemonisation, signal-driven
//! shutdown, and resource limits. [`Application`] exposes registered daemons
//! on the command line and wires configuration from [`treadle_config`].

mod command;
mod console;
mod controller;
mod events;
mod operation;
mod service;
mod telemetry;

/// Boxed error returned by hooks, work units and daemon constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use command::{
    Application, CatalogueResolver, CommandError, ConfigLoader, DaemonCommand, OptionsResolver,
    OrthoConfigLoader, ServiceFactory, SystemServiceFactory,
};
pub use console::{Console, LogLevel, LogSink, Logger, TracingLogSink};
pub use controller::{ControllerError, Cycle, Daemon, DaemonController, Events, Lifecycle};
pub use events::{EventError, EventRegistry, Hook, HookResult, NamedHook, Phase};
pub use operation::{Operation, OperationError, OperationHandler, OperationTable};
pub use service::{
    DaemonService, DaemonizeError, Daemonizer, LaunchMode, SHUTDOWN_TIMEOUT, ServiceError,
    ShutdownHandle, SystemDaemonService, SystemDaemonizer,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
