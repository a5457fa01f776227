use std::marker::PhantomData;

use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::{debug, info};
use treadle_config::Config;

use super::resolve::{OptionsResolver, ServiceFactory};
use super::{COMMAND_TARGET, CommandError, DaemonCommand};
use crate::console::{Console, Logger};
use crate::controller::{Daemon, DaemonController};
use crate::operation::{OperationError, OperationTable};

const OPERATION_ARG: &str = "operation";
const VERBOSE_ARG: &str = "verbose";

/// Collaborators available while executing one command.
pub(super) struct Invocation<'a> {
    pub(super) config: &'a Config,
    pub(super) resolver: &'a dyn OptionsResolver,
    pub(super) services: &'a dyn ServiceFactory,
    pub(super) console: Console,
}

/// Result of a command that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Outcome {
    Completed,
    ValidationFailed,
}

/// Type-erased entry point for one registered daemon.
pub(super) trait Registration {
    fn name(&self) -> &'static str;

    fn subcommand(&self) -> Command;

    fn execute(
        &self,
        matches: &ArgMatches,
        invocation: Invocation<'_>,
    ) -> Result<Outcome, CommandError>;
}

pub(super) struct Registered<D>(PhantomData<fn() -> D>);

impl<D> Registered<D> {
    pub(super) const fn new() -> Self {
        Self(PhantomData)
    }
}

fn operation_table<D: Daemon>() -> Result<OperationTable<D>, OperationError> {
    let mut operations = OperationTable::with_defaults();
    D::register_operations(&mut operations)?;
    Ok(operations)
}

impl<D: DaemonCommand> Registration for Registered<D> {
    fn name(&self) -> &'static str {
        D::NAME
    }

    fn subcommand(&self) -> Command {
        let usage = operation_table::<D>().map_or_else(
            |_| OperationTable::<D>::with_defaults().usage(),
            |operations| operations.usage(),
        );
        let command = Command::new(D::NAME)
            .about(D::ABOUT)
            .arg(
                Arg::new(OPERATION_ARG)
                    .value_name("OPERATION")
                    .required(true)
                    .help(format!("Operation to run ({usage})")),
            )
            .arg(
                Arg::new(VERBOSE_ARG)
                    .short('v')
                    .long("verbose")
                    .action(ArgAction::SetTrue)
                    .help("Echo lifecycle messages to standard output"),
            );
        D::configure(command)
    }

    fn execute(
        &self,
        matches: &ArgMatches,
        invocation: Invocation<'_>,
    ) -> Result<Outcome, CommandError> {
        let requested = matches
            .get_one::<String>(OPERATION_ARG)
            .ok_or(CommandError::MissingOperation)?;
        let operation = operation_table::<D>()?.resolve(requested)?;

        let daemon = D::from_matches(matches).map_err(|source| CommandError::Daemon {
            daemon: D::NAME,
            source,
        })?;
        if !daemon.validate() {
            debug!(target: COMMAND_TARGET, daemon = D::NAME, "validation rejected daemon");
            return Ok(Outcome::ValidationFailed);
        }

        let options = invocation.resolver.resolve(invocation.config, D::NAME)?;
        let mut service = invocation.services.create(D::NAME);
        service.initialize(&options)?;

        let mut controller = DaemonController::new(D::NAME, daemon, service)?
            .with_logger(Logger::default().with_console(invocation.console));
        controller.set_verbose(matches.get_flag(VERBOSE_ARG));

        info!(
            target: COMMAND_TARGET,
            daemon = D::NAME,
            operation = requested.as_str(),
            pid_file = %options.pid_location,
            "dispatching daemon operation"
        );
        operation.run(&mut controller)?;
        Ok(Outcome::Completed)
    }
}

