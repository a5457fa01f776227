//! TOML catalogue of daemon definitions keyed by daemon name.
//!
//! ```toml
//! [daemons.acme_mailer]
//! app_name = "mailer"
//! log_dir = "/var/log/acme"
//! app_user = "mail"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::identity::IdentityLookup;
use crate::options::{DaemonOptions, ResolveError, options_key};

const CATALOGUE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::catalogue");

/// Raw per-daemon settings as written in the catalogue.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonDefinition {
    /// Process name; also names the log and PID files.
    pub app_name: String,
    /// Working directory of the daemonised process.
    pub app_dir: Utf8PathBuf,
    /// Free-form description.
    pub app_description: String,
    /// Directory receiving `<app_name>Daemon.log`.
    pub log_dir: Option<Utf8PathBuf>,
    /// Maintainer name.
    pub author_name: String,
    /// Maintainer contact address.
    pub author_email: String,
    /// Directory receiving `<app_name>/<app_name>.pid`.
    pub app_pid_dir: Option<Utf8PathBuf>,
    /// CPU time budget in seconds; `0` disables the limit.
    pub sys_max_execution_time: u64,
    /// Address space limit such as `1024M`; `0` or `-1` disables the limit.
    pub sys_memory_limit: String,
    /// User to run as after daemonising.
    pub app_user: Option<String>,
    /// Group to run as after daemonising.
    pub app_group: Option<String>,
    /// Numeric uid used when no user name is configured or it cannot be resolved.
    pub app_run_as_uid: Option<u32>,
    /// Numeric gid used when no group name is configured or it cannot be resolved.
    pub app_run_as_gid: Option<u32>,
}

impl Default for DaemonDefinition {
    fn default() -> Self {
        Self {
            app_name: "systemDaemon".to_owned(),
            app_dir: Utf8PathBuf::from("."),
            app_description: "System Daemon".to_owned(),
            log_dir: None,
            author_name: String::new(),
            author_email: String::new(),
            app_pid_dir: None,
            sys_max_execution_time: 0,
            sys_memory_limit: "1024M".to_owned(),
            app_user: None,
            app_group: None,
            app_run_as_uid: None,
            app_run_as_gid: None,
        }
    }
}

/// Collection of daemon definitions loaded from the catalogue file.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DaemonCatalogue {
    #[serde(default)]
    daemons: BTreeMap<String, DaemonDefinition>,
}

impl DaemonCatalogue {
    /// Creates an empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the catalogue at `path`; a missing file yields an empty catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogueError::Read`] when the file exists but cannot be
    /// read and [`CatalogueError::Parse`] when its contents are not a valid
    /// catalogue.
    pub fn load(path: &Utf8Path) -> Result<Self, CatalogueError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(
                    target: CATALOGUE_TARGET,
                    file = %path,
                    "daemon catalogue not found; no daemons configured"
                );
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(CatalogueError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&text).map_err(|source| CatalogueError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses catalogue text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error for malformed text, unknown keys, or values of
    /// the wrong type.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Looks up the definition for a daemon command name.
    ///
    /// Command names are normalised with [`options_key`] first, so
    /// `acme:mailer` finds the `acme_mailer` table.
    #[must_use]
    pub fn definition(&self, daemon: &str) -> Option<&DaemonDefinition> {
        self.daemons.get(&options_key(daemon))
    }

    /// Resolves the options for `daemon`, deriving file locations and run-as ids.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingConfiguration`] when the catalogue has
    /// no table for `daemon`, or a memory-limit error when its limit does not
    /// parse.
    pub fn resolve(
        &self,
        daemon: &str,
        identities: &dyn IdentityLookup,
    ) -> Result<DaemonOptions, ResolveError> {
        let definition = self
            .definition(daemon)
            .ok_or_else(|| ResolveError::MissingConfiguration {
                daemon: daemon.to_owned(),
                key: options_key(daemon),
            })?;
        DaemonOptions::resolve(definition, identities)
    }

    /// Names of every configured daemon.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.daemons.keys().map(String::as_str)
    }
}

/// Errors raised while reading the daemon catalogue.
#[derive(Debug, Error)]
pub enum CatalogueError {
    /// The catalogue file exists but could not be read.
    #[error("failed to read daemon catalogue '{path}': {source}")]
    Read {
        /// Catalogue path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The catalogue is not valid TOML or contains unknown keys.
    #[error("failed to parse daemon catalogue '{path}': {source}")]
    Parse {
        /// Catalogue path.
        path: Utf8PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}
