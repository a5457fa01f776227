//! Process-level daemon services driven by the lifecycle controller.
//!
//! The controller never inspects processes itself; it asks a
//! [`DaemonService`] whether the daemon is running and delegates every
//! transition to it. [`SystemDaemonService`] is the production
//! implementation.

mod error;
mod system;

pub use error::{DaemonizeError, ServiceError};
pub use system::{
    Daemonizer, LaunchMode, SHUTDOWN_TIMEOUT, ShutdownHandle, SystemDaemonService, SystemDaemonizer,
};

use treadle_config::DaemonOptions;

/// OS-level daemon operations consumed by the controller.
pub trait DaemonService {
    /// Prepares the service for the daemon described by `options`.
    ///
    /// # Errors
    ///
    /// Returns an error when runtime paths cannot be prepared.
    fn initialize(&mut self, options: &DaemonOptions) -> Result<(), ServiceError>;

    /// Reports whether the daemon is running.
    ///
    /// # Errors
    ///
    /// Returns an error when the running state cannot be determined.
    fn is_running(&self) -> Result<bool, ServiceError>;

    /// Transitions the daemon into the running state.
    ///
    /// # Errors
    ///
    /// Returns an error when the daemon cannot be started.
    fn start(&mut self) -> Result<(), ServiceError>;

    /// Transitions the daemon into the stopped state.
    ///
    /// # Errors
    ///
    /// Returns an error when the daemon cannot be stopped.
    fn stop(&mut self) -> Result<(), ServiceError>;

    /// Stops the running daemon and starts it again.
    ///
    /// # Errors
    ///
    /// Returns an error when either transition fails.
    fn restart(&mut self) -> Result<(), ServiceError>;

    /// Asks a running daemon owned by this process to finish after the
    /// current cycle.
    fn request_shutdown(&mut self);
}

impl<S> DaemonService for Box<S>
where
    S: DaemonService + ?Sized,
{
    fn initialize(&mut self, options: &DaemonOptions) -> Result<(), ServiceError> {
        (**self).initialize(options)
    }

    fn is_running(&self) -> Result<bool, ServiceError> {
        (**self).is_running()
    }

    fn start(&mut self) -> Result<(), ServiceError> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<(), ServiceError> {
        (**self).stop()
    }

    fn restart(&mut self) -> Result<(), ServiceError> {
        (**self).restart()
    }

    fn request_shutdown(&mut self) {
        (**self).request_shutdown();
    }
}
