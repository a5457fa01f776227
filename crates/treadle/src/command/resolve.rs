//! Seams supplying daemon options and services to the command runner.

use treadle_config::{Config, DaemonOptions, IdentityLookup, SystemIdentityLookup};

use super::CommandError;
use crate::service::{DaemonService, SystemDaemonService};

/// Resolves per-daemon options from the global configuration.
pub trait OptionsResolver {
    /// Returns the options for the daemon registered as `daemon`.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalogue cannot be read or has no usable
    /// entry for `daemon`.
    fn resolve(&self, config: &Config, daemon: &str) -> Result<DaemonOptions, CommandError>;
}

/// Resolver reading the TOML daemon catalogue named by the configuration.
pub struct CatalogueResolver {
    identities: Box<dyn IdentityLookup>,
}

impl Default for CatalogueResolver {
    fn default() -> Self {
        Self::new(SystemIdentityLookup)
    }
}

impl CatalogueResolver {
    /// Builds a resolver using `identities` for user and group lookups.
    #[must_use]
    pub fn new(identities: impl IdentityLookup + 'static) -> Self {
        Self {
            identities: Box::new(identities),
        }
    }
}

impl OptionsResolver for CatalogueResolver {
    fn resolve(&self, config: &Config, daemon: &str) -> Result<DaemonOptions, CommandError> {
        let catalogue = config.catalogue()?;
        Ok(catalogue.resolve(daemon, self.identities.as_ref())?)
    }
}

/// Builds the daemon service for each command invocation.
pub trait ServiceFactory {
    /// Creates a service for the daemon registered as `daemon`.
    fn create(&self, daemon: &str) -> Box<dyn DaemonService>;
}

impl<F> ServiceFactory for F
where
    F: Fn(&str) -> Box<dyn DaemonService>,
{
    fn create(&self, daemon: &str) -> Box<dyn DaemonService> {
        self(daemon)
    }
}

/// Factory producing [`SystemDaemonService`] instances whose launch mode
/// follows `TREADLE_FOREGROUND`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemServiceFactory;

impl ServiceFactory for SystemServiceFactory {
    fn create(&self, _daemon: &str) -> Box<dyn DaemonService> {
        Box::new(SystemDaemonService::from_env())
    }
}
