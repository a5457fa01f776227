//! Operations a daemon command accepts.
//!
//! Every controller permits `start`, `stop` and `restart`. Daemons may add
//! named custom operations through [`Daemon::register_operations`].
//!
//! [`Daemon::register_operations`]: crate::Daemon::register_operations

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::controller::{ControllerError, Daemon, DaemonController};

const OPERATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::controller");

/// Handler backing a custom operation.
pub type OperationHandler<D> = fn(&mut DaemonController<D>) -> Result<(), ControllerError>;

/// A resolved operation ready to run against a controller.
pub enum Operation<D: Daemon> {
    /// Start the daemon and run its cycle loop.
    Start,
    /// Stop the running daemon.
    Stop,
    /// Restart the running daemon and run its cycle loop.
    Restart,
    /// Daemon-specific operation.
    Custom(OperationHandler<D>),
}

impl<D: Daemon> Clone for Operation<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: Daemon> Copy for Operation<D> {}

impl<D: Daemon> fmt::Debug for Operation<D> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => formatter.write_str("Start"),
            Self::Stop => formatter.write_str("Stop"),
            Self::Restart => formatter.write_str("Restart"),
            Self::Custom(_) => formatter.write_str("Custom"),
        }
    }
}

impl<D: Daemon> Operation<D> {
    /// Runs the operation against `controller`.
    ///
    /// # Errors
    ///
    /// Propagates the controller's error for the chosen operation.
    pub fn run(self, controller: &mut DaemonController<D>) -> Result<(), ControllerError> {
        match self {
            Self::Start => controller.start(),
            Self::Stop => controller.stop(),
            Self::Restart => controller.restart(),
            Self::Custom(handler) => handler(controller),
        }
    }
}

/// Errors raised while registering or resolving operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    /// The requested operation is not permitted for this daemon.
    #[error("unknown operation '{name}'; expected one of {permitted}")]
    Unknown {
        /// Requested operation name.
        name: String,
        /// Permitted names joined with `|`.
        permitted: String,
    },
    /// A custom operation name was not a lowercase identifier.
    #[error("invalid operation name {name:?}; use lowercase letters, digits, '-' or '_'")]
    InvalidName {
        /// Rejected name.
        name: String,
    },
}

/// Permitted operations in registration order.
pub struct OperationTable<D: Daemon> {
    entries: Vec<(String, Operation<D>)>,
}

impl<D: Daemon> fmt::Debug for OperationTable<D> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.names()).finish()
    }
}

impl<D: Daemon> Default for OperationTable<D> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<D: Daemon> OperationTable<D> {
    /// Builds a table holding `start`, `stop` and `restart`.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            entries: vec![
                ("start".to_owned(), Operation::Start),
                ("stop".to_owned(), Operation::Stop),
                ("restart".to_owned(), Operation::Restart),
            ],
        }
    }

    /// Registers a custom operation.
    ///
    /// The first registration of a name wins; later ones are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidName`] unless `name` is a non-empty
    /// run of lowercase ASCII letters, digits, `-` or `_`.
    pub fn add(&mut self, name: &str, handler: OperationHandler<D>) -> Result<(), OperationError> {
        if !is_operation_name(name) {
            return Err(OperationError::InvalidName {
                name: name.to_owned(),
            });
        }
        if self.contains(name) {
            debug!(target: OPERATION_TARGET, operation = name, "operation already registered");
            return Ok(());
        }
        self.entries.push((name.to_owned(), Operation::Custom(handler)));
        Ok(())
    }

    /// Looks up `name`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Unknown`] listing the permitted names when
    /// `name` is not registered.
    pub fn resolve(&self, name: &str) -> Result<Operation<D>, OperationError> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, operation)| *operation)
            .ok_or_else(|| OperationError::Unknown {
                name: name.to_owned(),
                permitted: self.usage(),
            })
    }

    /// Returns `true` when `name` is permitted.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(candidate, _)| candidate == name)
    }

    /// Permitted names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Permitted names joined with `|`, as shown in help text.
    #[must_use]
    pub fn usage(&self) -> String {
        self.names().collect::<Vec<_>>().join("|")
    }
}

fn is_operation_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
}
