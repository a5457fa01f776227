//! Daemon lifecycle controller.
//!
//! [`DaemonController`] drives `start`, `stop` and `restart` against an
//! injected [`DaemonService`], runs the cycle loop while the service reports
//! the daemon running, and fires the registered hooks at each phase
//! boundary:
//!
//! ```text
//! start:   service.start, START, (CYCLE_START, work, CYCLE_END)*, STOP, service.stop
//! restart: service.restart, START, (CYCLE_START, work, CYCLE_END)*, STOP, service.stop
//! stop:    STOP, service.stop
//! ```
//!
//! The controller keeps no run state of its own; every precondition and loop
//! check asks the service.

mod cycle;
mod error;

use std::fmt;

use strum::Display;

pub use cycle::Cycle;
pub use error::ControllerError;

use crate::BoxError;
use crate::console::{LogLevel, Logger};
use crate::events::{EventError, EventRegistry, Phase};
use crate::operation::{OperationError, OperationTable};
use crate::service::DaemonService;

/// Hook registry handed to a daemon's hooks.
pub type Events<D> = EventRegistry<DaemonController<D>>;

/// A long-running unit of work driven by a [`DaemonController`].
pub trait Daemon: Sized + 'static {
    /// Runs one cycle of work.
    ///
    /// The controller calls this repeatedly while the service reports the
    /// daemon running. Implementations pace themselves; the controller adds
    /// no delay between cycles.
    ///
    /// # Errors
    ///
    /// Any error aborts the loop; `STOP` hooks are skipped.
    fn run_cycle(&mut self, cycle: &mut Cycle<'_>) -> Result<(), BoxError>;

    /// Checks that the daemon may run; `false` aborts the command before any
    /// lifecycle operation.
    fn validate(&self) -> bool {
        true
    }

    /// Adds daemon-specific operations to the default table.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidName`] for a malformed name.
    fn register_operations(_operations: &mut OperationTable<Self>) -> Result<(), OperationError> {
        Ok(())
    }

    /// Registers the daemon's own hooks.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] when a hook name is rejected.
    fn register_events(&self, _events: &mut Events<Self>) -> Result<(), EventError> {
        Ok(())
    }
}

/// Lifecycle operations guarded against nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Lifecycle {
    /// `start`.
    Start,
    /// `stop`.
    Stop,
    /// `restart`.
    Restart,
}

/// Runs a [`Daemon`] through its lifecycle.
pub struct DaemonController<D: Daemon> {
    name: String,
    daemon: D,
    service: Box<dyn DaemonService>,
    events: Events<D>,
    operations: OperationTable<D>,
    logger: Logger,
    active: Option<Lifecycle>,
}

impl<D: Daemon> fmt::Debug for DaemonController<D> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DaemonController")
            .field("name", &self.name)
            .field("events", &self.events)
            .field("operations", &self.operations)
            .field("logger", &self.logger)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl<D: Daemon> DaemonController<D> {
    /// Builds a controller for `daemon`, registering its operations and
    /// hooks.
    ///
    /// The service must already be initialised.
    ///
    /// # Errors
    ///
    /// Returns an error when the daemon registers an invalid operation or
    /// hook name.
    pub fn new(
        name: impl Into<String>,
        daemon: D,
        service: Box<dyn DaemonService>,
    ) -> Result<Self, ControllerError> {
        let mut operations = OperationTable::with_defaults();
        D::register_operations(&mut operations)?;
        let mut events = Events::new();
        daemon.register_events(&mut events)?;
        Ok(Self {
            name: name.into(),
            daemon,
            service,
            events,
            operations,
            logger: Logger::default(),
            active: None,
        })
    }

    /// Replaces the logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Command name of the daemon.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Enables or disables the console echo of lifecycle messages.
    pub const fn set_verbose(&mut self, verbose: bool) {
        self.logger.set_verbose(verbose);
    }

    /// The daemon being driven.
    #[must_use]
    pub const fn daemon(&self) -> &D {
        &self.daemon
    }

    /// Mutable access to the daemon being driven.
    pub const fn daemon_mut(&mut self) -> &mut D {
        &mut self.daemon
    }

    /// Registered hooks.
    #[must_use]
    pub const fn events(&self) -> &Events<D> {
        &self.events
    }

    /// Mutable access to the hook registry.
    pub const fn events_mut(&mut self) -> &mut Events<D> {
        &mut self.events
    }

    /// Permitted operations.
    #[must_use]
    pub const fn operations(&self) -> &OperationTable<D> {
        &self.operations
    }

    /// The injected process daemon service.
    #[must_use]
    pub fn service(&self) -> &dyn DaemonService {
        self.service.as_ref()
    }

    /// Asks the service whether the daemon is running.
    ///
    /// # Errors
    ///
    /// Propagates service failures.
    pub fn is_running(&self) -> Result<bool, ControllerError> {
        Ok(self.service.is_running()?)
    }

    /// Asks the service to end the cycle loop after the current cycle.
    pub fn request_shutdown(&mut self) {
        self.service.request_shutdown();
    }

    /// Records a lifecycle message and echoes it when verbose.
    pub fn log(&mut self, level: LogLevel, message: &str) {
        self.logger.log(level, message);
    }

    /// Resolves `operation` against the permitted table and runs it.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Unknown`] for names outside the table and
    /// otherwise propagates the operation's error.
    pub fn dispatch(&mut self, operation: &str) -> Result<(), ControllerError> {
        let resolved = self.operations.resolve(operation)?;
        resolved.run(self)
    }

    /// Starts the daemon and runs the cycle loop until the service stops
    /// reporting it running.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::AlreadyRunning`] without touching the
    /// service when the daemon is running, [`ControllerError::Reentrant`]
    /// when called from inside another lifecycle operation, and otherwise
    /// the first service, hook, or work failure.
    pub fn start(&mut self) -> Result<(), ControllerError> {
        self.guarded(Lifecycle::Start, Self::run_start)
    }

    /// Stops the running daemon.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotRunning`] without touching the service
    /// when the daemon is stopped, [`ControllerError::Reentrant`] when called
    /// from inside another lifecycle operation, and otherwise the first
    /// service or hook failure.
    pub fn stop(&mut self) -> Result<(), ControllerError> {
        self.guarded(Lifecycle::Stop, Self::run_stop)
    }

    /// Restarts the running daemon and runs the cycle loop.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotRunning`] without touching the service
    /// when the daemon is stopped, [`ControllerError::Reentrant`] when called
    /// from inside another lifecycle operation, and otherwise the first
    /// service, hook, or work failure.
    pub fn restart(&mut self) -> Result<(), ControllerError> {
        self.guarded(Lifecycle::Restart, Self::run_restart)
    }

    fn guarded(
        &mut self,
        requested: Lifecycle,
        operation: fn(&mut Self) -> Result<(), ControllerError>,
    ) -> Result<(), ControllerError> {
        if let Some(active) = self.active {
            return Err(ControllerError::Reentrant { requested, active });
        }
        self.active = Some(requested);
        let outcome = operation(self);
        self.active = None;
        outcome
    }

    fn run_start(&mut self) -> Result<(), ControllerError> {
        if self.service.is_running()? {
            return Err(ControllerError::AlreadyRunning {
                daemon: self.name.clone(),
            });
        }
        self.log(LogLevel::Info, "Starting the daemon.");
        self.service.start()?;
        self.run_until_stopped()
    }

    fn run_restart(&mut self) -> Result<(), ControllerError> {
        self.ensure_running()?;
        self.log(LogLevel::Info, "Restarting the daemon.");
        self.service.restart()?;
        self.run_until_stopped()
    }

    fn run_stop(&mut self) -> Result<(), ControllerError> {
        self.ensure_running()?;
        self.log(LogLevel::Info, "Stopping the daemon.");
        self.run_events(Phase::Stop)?;
        self.service.stop()?;
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), ControllerError> {
        if self.service.is_running()? {
            Ok(())
        } else {
            Err(ControllerError::NotRunning {
                daemon: self.name.clone(),
            })
        }
    }

    fn run_until_stopped(&mut self) -> Result<(), ControllerError> {
        self.run_events(Phase::Start)?;
        let cycles = self.run_cycles()?;
        self.log(
            LogLevel::Info,
            &format!("Daemon finished after {cycles} cycles."),
        );
        self.run_events(Phase::Stop)?;
        self.service.stop()?;
        Ok(())
    }

    fn run_cycles(&mut self) -> Result<u64, ControllerError> {
        let mut completed = 0_u64;
        while self.service.is_running()? {
            let number = completed.saturating_add(1);
            self.run_events(Phase::CycleStart)?;
            let mut cycle = Cycle::new(number, &mut self.logger, self.service.as_mut());
            self.daemon
                .run_cycle(&mut cycle)
                .map_err(|source| ControllerError::Work {
                    cycle: number,
                    source,
                })?;
            self.run_events(Phase::CycleEnd)?;
            completed = number;
        }
        Ok(completed)
    }

    fn run_events(&mut self, phase: Phase) -> Result<(), ControllerError> {
        self.log(
            LogLevel::Info,
            &format!("Finding all {phase} events and running them."),
        );
        for entry in self.events.snapshot(phase) {
            self.log(
                LogLevel::Info,
                &format!("Running the `{}` {phase} event.", entry.name()),
            );
            (entry.hook())(&mut *self).map_err(|source| ControllerError::Hook {
                phase,
                name: entry.name().to_owned(),
                source,
            })?;
        }
        Ok(())
    }
}
