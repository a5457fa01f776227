//! Shared configuration for Treadle daemons.
//!
//! Global settings (telemetry filter and format, location of the daemon
//! catalogue) are layered with `ortho_config`: defaults, then the
//! configuration file, then `TREADLE_*` environment variables, then CLI flags.
//! Per-daemon options live in a separate TOML catalogue keyed by daemon name
//! and are resolved into [`DaemonOptions`] on demand.

use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

mod catalogue;
mod defaults;
mod identity;
mod logging;
mod options;

pub use catalogue::{CatalogueError, DaemonCatalogue, DaemonDefinition};
pub use defaults::{
    DEFAULT_LOG_FILTER, default_daemons_path, default_log_filter, default_log_filter_string,
    default_log_format, default_runtime_directory,
};
pub use identity::{IdentityLookup, SystemIdentityLookup};
pub use logging::{LogFormat, LogFormatParseError};
pub use options::{
    DaemonOptions, MemoryLimit, MemoryLimitParseError, ResolveError, ResourceLimits, RunAs,
    options_key,
};

/// Global configuration shared by every daemon command.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "TREADLE")]
pub struct Config {
    /// `tracing` filter expression applied to daemon telemetry.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for daemon telemetry.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Path of the TOML catalogue describing each daemon.
    #[ortho_config(default = defaults::default_daemons_path())]
    pub daemons_path: Utf8PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            daemons_path: default_daemons_path(),
        }
    }
}

impl Config {
    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is the program name, mirroring `std::env::args_os`.
    ///
    /// # Errors
    ///
    /// Returns an error when a configuration layer fails to load or merge.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Telemetry filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Telemetry output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Location of the daemon catalogue.
    #[must_use]
    pub fn daemons_path(&self) -> &camino::Utf8Path {
        self.daemons_path.as_path()
    }

    /// Reads the daemon catalogue referenced by this configuration.
    ///
    /// A missing catalogue file yields an empty catalogue so lookups report
    /// [`ResolveError::MissingConfiguration`] for every daemon.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogueError`] when the file cannot be read or parsed.
    pub fn catalogue(&self) -> Result<DaemonCatalogue, CatalogueError> {
        DaemonCatalogue::load(self.daemons_path())
    }
}
