//! Command-line surface for registered daemons.
//!
//! An [`Application`] exposes one subcommand per registered
//! [`DaemonCommand`]. Each subcommand takes a single positional operation
//! (`start`, `stop`, `restart`, or a daemon-specific name) and `--verbose`:
//!
//! ```text
//! treadle-heartbeat [--log-filter FILTER] treadle:heartbeat start --verbose
//! ```
//!
//! Global configuration flags must precede the subcommand. Exit status is `0`
//! on success and `1` on validation failure or any reported error.

mod config;
mod error;
mod registration;
mod resolve;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{ArgMatches, Command};
use tracing::debug;

pub use config::{ConfigLoader, OrthoConfigLoader};
pub use error::CommandError;
pub use resolve::{CatalogueResolver, OptionsResolver, ServiceFactory, SystemServiceFactory};

use config::{prepare_cli_arguments, split_config_arguments};
use registration::{Invocation, Outcome, Registered, Registration};

use crate::BoxError;
use crate::console::Console;
use crate::controller::Daemon;
use crate::telemetry;

pub(crate) const COMMAND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::command");

/// A daemon that can be launched from the command line.
pub trait DaemonCommand: Daemon {
    /// Subcommand name, for example `acme:mailer`.
    const NAME: &'static str;
    /// One-line description shown in help output.
    const ABOUT: &'static str;

    /// Adds daemon-specific arguments to the subcommand.
    #[must_use]
    fn configure(command: Command) -> Command {
        command
    }

    /// Builds the daemon from its parsed subcommand arguments.
    ///
    /// # Errors
    ///
    /// Returns an error when the arguments cannot be turned into a daemon.
    fn from_matches(matches: &ArgMatches) -> Result<Self, BoxError>;
}

/// Runs registered daemons from command-line arguments.
pub struct Application {
    name: &'static str,
    about: Option<&'static str>,
    registrations: Vec<Box<dyn Registration>>,
    loader: Box<dyn ConfigLoader>,
    resolver: Box<dyn OptionsResolver>,
    services: Box<dyn ServiceFactory>,
}

impl Application {
    /// Builds an application with the production configuration loader,
    /// catalogue resolver and system daemon service.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            about: None,
            registrations: Vec::new(),
            loader: Box::new(OrthoConfigLoader),
            resolver: Box::new(CatalogueResolver::default()),
            services: Box::new(SystemServiceFactory),
        }
    }

    /// Sets the top-level description shown in help output.
    #[must_use]
    pub const fn about(mut self, about: &'static str) -> Self {
        self.about = Some(about);
        self
    }

    /// Registers daemon `D` as a subcommand.
    ///
    /// A second registration under the same name is ignored.
    #[must_use]
    pub fn register<D: DaemonCommand>(mut self) -> Self {
        if self.registration(D::NAME).is_some() {
            debug!(target: COMMAND_TARGET, daemon = D::NAME, "daemon already registered");
            return self;
        }
        self.registrations.push(Box::new(Registered::<D>::new()));
        self
    }

    /// Replaces the configuration loader.
    #[must_use]
    pub fn with_config_loader(mut self, loader: impl ConfigLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Replaces the daemon options resolver.
    #[must_use]
    pub fn with_options_resolver(mut self, resolver: impl OptionsResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Replaces the daemon service factory.
    #[must_use]
    pub fn with_service_factory(mut self, services: impl ServiceFactory + 'static) -> Self {
        self.services = Box::new(services);
        self
    }

    /// Names of the registered daemons in registration order.
    pub fn daemons(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registrations.iter().map(|registration| registration.name())
    }

    /// Parses `args` and runs the requested daemon operation.
    ///
    /// Help output goes to `stdout`; lifecycle messages are echoed there when
    /// `--verbose` is given. Errors are written to `stderr`.
    #[must_use]
    pub fn run<I, T, W, E>(&self, args: I, mut stdout: W, mut stderr: E) -> ExitCode
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
        W: Write + 'static,
        E: Write,
    {
        let arguments: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let split = split_config_arguments(&arguments);
        let cli_arguments = prepare_cli_arguments(&arguments, &split);

        let parsed = self
            .loader
            .load(&split.config_arguments)
            .and_then(|config| {
                telemetry::initialise(&config)?;
                Ok(config)
            })
            .and_then(|config| {
                self.cli()
                    .try_get_matches_from(cli_arguments)
                    .map(|matches| (config, matches))
                    .map_err(CommandError::Usage)
            });

        let (config, matches) = match parsed {
            Ok(parsed) => parsed,
            Err(CommandError::Usage(error)) if is_informational(&error) => {
                report(&mut stdout, &error.render());
                return ExitCode::SUCCESS;
            }
            Err(error) => {
                report(&mut stderr, &error);
                return ExitCode::FAILURE;
            }
        };

        let outcome = self.dispatch(&matches, |registration, sub_matches| {
            registration.execute(
                sub_matches,
                Invocation {
                    config: &config,
                    resolver: self.resolver.as_ref(),
                    services: self.services.as_ref(),
                    console: Console::new(stdout),
                },
            )
        });

        match outcome {
            Ok(Outcome::Completed) => ExitCode::SUCCESS,
            Ok(Outcome::ValidationFailed) => {
                report(&mut stderr, &"validation failed");
                ExitCode::FAILURE
            }
            Err(error) => {
                report(&mut stderr, &error);
                ExitCode::FAILURE
            }
        }
    }

    fn cli(&self) -> Command {
        let mut command = Command::new(self.name)
            .subcommand_required(true)
            .arg_required_else_help(true)
            .disable_help_subcommand(true);
        if let Some(about) = self.about {
            command = command.about(about);
        }
        self.registrations
            .iter()
            .fold(command, |parent, registration| {
                parent.subcommand(registration.subcommand())
            })
    }

    fn registration(&self, name: &str) -> Option<&dyn Registration> {
        self.registrations
            .iter()
            .find(|registration| registration.name() == name)
            .map(|registration| &**registration)
    }

    fn dispatch<F>(&self, matches: &ArgMatches, execute: F) -> Result<Outcome, CommandError>
    where
        F: FnOnce(&dyn Registration, &ArgMatches) -> Result<Outcome, CommandError>,
    {
        let (name, sub_matches) = matches
            .subcommand()
            .ok_or_else(|| CommandError::UnknownDaemon(String::new()))?;
        let registration = self
            .registration(name)
            .ok_or_else(|| CommandError::UnknownDaemon(name.to_owned()))?;
        execute(registration, sub_matches)
    }
}

fn is_informational(error: &clap::Error) -> bool {
    matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}

fn report(writer: &mut impl Write, message: &dyn std::fmt::Display) {
    if let Err(error) = writeln!(writer, "{message}") {
        debug!(target: COMMAND_TARGET, %error, "failed to write command output");
    }
}

#[cfg(test)]
mod tests;
