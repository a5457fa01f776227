//! Process-wide `tracing` subscriber for daemon commands.
//!
//! Events go to standard error with RFC 3339 UTC timestamps, either as
//! flattened JSON objects or as compact text lines.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use treadle_config::{Config, LogFormat};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Marker proving telemetry is active for this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Reasons telemetry could not be installed.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression is not a valid `EnvFilter`.
    #[error("log filter does not parse: {0}")]
    Filter(String),
    /// A global subscriber was already installed by someone else.
    #[error("could not install the global subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber described by `config` on first use.
///
/// Subsequent calls leave the installed subscriber untouched, even when
/// `config` differs.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparseable filter and
/// [`TelemetryError::Subscriber`] when a foreign subscriber is already set.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED.get_or_try_init(|| install_subscriber(config))?;
    Ok(TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    let subscriber = Registry::default()
        .with(output_layer(config.log_format()))
        .with(filter);
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn output_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(io::stderr().is_terminal())
            .with_timer(UtcTime::rfc_3339())
            .with_writer(io::stderr)
            .boxed(),
    }
}
