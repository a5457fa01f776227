//! Audit logging for lifecycle messages with optional console echo.
//!
//! Every message is recorded by a [`LogSink`]. When verbose output is
//! enabled the message is also echoed to a [`Console`] as
//! `<level>message</level>`.

use std::fmt;
use std::io::{self, Write};

use strum::{Display, EnumString};
use tracing::warn;

/// Severity of a lifecycle log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    /// Failures.
    Error,
    /// Recoverable problems.
    Warning,
    /// Routine lifecycle progress.
    #[default]
    Info,
    /// Diagnostic detail.
    Debug,
}

/// Destination for lifecycle log messages.
pub trait LogSink {
    /// Records `message` at `level`.
    fn record(&self, level: LogLevel, message: &str);
}

/// Sink forwarding lifecycle messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl TracingLogSink {
    /// Builds a new sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LogSink for TracingLogSink {
    fn record(&self, level: LogLevel, message: &str) {
        const TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::controller");
        match level {
            LogLevel::Error => tracing::error!(target: TARGET, "{message}"),
            LogLevel::Warning => tracing::warn!(target: TARGET, "{message}"),
            LogLevel::Info => tracing::info!(target: TARGET, "{message}"),
            LogLevel::Debug => tracing::debug!(target: TARGET, "{message}"),
        }
    }
}

/// Interactive output channel used for verbose echo.
pub struct Console {
    writer: Box<dyn Write>,
}

impl Console {
    /// Wraps `writer`.
    #[must_use]
    pub fn new(writer: impl Write + 'static) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    /// Writes `message` wrapped in level tags and flushes.
    ///
    /// # Errors
    ///
    /// Propagates write failures from the underlying writer.
    pub fn echo(&mut self, level: LogLevel, message: &str) -> io::Result<()> {
        writeln!(self.writer, "<{level}>{message}</{level}>")?;
        self.writer.flush()
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Console").finish_non_exhaustive()
    }
}

/// Combines the audit sink with the verbose console echo.
pub struct Logger {
    sink: Box<dyn LogSink>,
    console: Option<Console>,
    verbose: bool,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(TracingLogSink)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Logger")
            .field("console", &self.console)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Builds a quiet logger recording into `sink`.
    #[must_use]
    pub fn new(sink: impl LogSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            console: None,
            verbose: false,
        }
    }

    /// Attaches the console used for verbose echo.
    #[must_use]
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = Some(console);
        self
    }

    /// Enables or disables the console echo.
    pub const fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Records `message` and echoes it when verbose.
    ///
    /// Console write failures are reported through `tracing` and otherwise
    /// ignored.
    pub fn log(&mut self, level: LogLevel, message: &str) {
        self.sink.record(level, message);
        if !self.verbose {
            return;
        }
        if let Some(console) = self.console.as_mut()
            && let Err(error) = console.echo(level, message)
        {
            warn!(
                target: concat!(env!("CARGO_PKG_NAME"), "::controller"),
                %error,
                "failed to echo lifecycle message"
            );
        }
    }
}
