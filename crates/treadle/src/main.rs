//! Heartbeat daemon built on the treadle lifecycle controller.
//!
//! `treadle-heartbeat treadle:heartbeat start` logs a heartbeat every
//! interval until the process receives `SIGTERM`, and
//! `treadle-heartbeat treadle:heartbeat stop` sends that signal from another
//! shell. Set `TREADLE_FOREGROUND=1` to keep the daemon attached to the
//! terminal.

use std::io;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::{Arg, ArgMatches, Command, value_parser};
use treadle::{
    Application, BoxError, ControllerError, Cycle, Daemon, DaemonCommand, DaemonController,
    EventError, Events, LogLevel, OperationError, OperationTable, Phase,
};

const INTERVAL_ARG: &str = "interval-ms";

struct Heartbeat {
    interval: Duration,
}

impl Daemon for Heartbeat {
    fn run_cycle(&mut self, cycle: &mut Cycle<'_>) -> Result<(), BoxError> {
        cycle.log(LogLevel::Info, &format!("heartbeat {}", cycle.number()));
        thread::sleep(self.interval);
        Ok(())
    }

    fn validate(&self) -> bool {
        !self.interval.is_zero()
    }

    fn register_operations(operations: &mut OperationTable<Self>) -> Result<(), OperationError> {
        operations.add("status", status)
    }

    fn register_events(&self, events: &mut Events<Self>) -> Result<(), EventError> {
        let interval = self.interval;
        events.add_event(
            Phase::Start,
            "announce",
            move |controller: &mut DaemonController<Self>| {
                controller.log(
                    LogLevel::Info,
                    &format!("Beating every {}ms.", interval.as_millis()),
                );
                Ok(())
            },
        )?;
        events.add_event(
            Phase::Stop,
            "farewell",
            |controller: &mut DaemonController<Self>| {
                controller.log(LogLevel::Info, "Heartbeat stopped.");
                Ok(())
            },
        )
    }
}

fn status(controller: &mut DaemonController<Heartbeat>) -> Result<(), ControllerError> {
    let message = if controller.is_running()? {
        "The heartbeat daemon is running."
    } else {
        "The heartbeat daemon is stopped."
    };
    controller.log(LogLevel::Info, message);
    Ok(())
}

impl DaemonCommand for Heartbeat {
    const NAME: &'static str = "treadle:heartbeat";
    const ABOUT: &'static str = "Logs a heartbeat at a fixed interval";

    fn configure(command: Command) -> Command {
        command.arg(
            Arg::new(INTERVAL_ARG)
                .long(INTERVAL_ARG)
                .value_name("MILLISECONDS")
                .value_parser(value_parser!(u64))
                .default_value("1000")
                .help("Delay between heartbeats"),
        )
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, BoxError> {
        let millis = matches
            .get_one::<u64>(INTERVAL_ARG)
            .copied()
            .ok_or("missing heartbeat interval")?;
        Ok(Self {
            interval: Duration::from_millis(millis),
        })
    }
}

fn main() -> ExitCode {
    Application::new("treadle-heartbeat")
        .about("Runs the treadle heartbeat daemon")
        .register::<Heartbeat>()
        .run(std::env::args_os(), io::stdout(), io::stderr())
}
