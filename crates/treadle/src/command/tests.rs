//! Unit tests for the command runner.

use std::cell::RefCell;
use std::fs;
use std::process::ExitCode;
use std::rc::Rc;

use camino::Utf8PathBuf;
use clap::{Arg, ArgAction, ArgMatches, Command};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::{Application, DaemonCommand};
use crate::BoxError;
use crate::console::LogLevel;
use crate::controller::{ControllerError, Cycle, Daemon, DaemonController};
use crate::operation::{OperationError, OperationTable};
use crate::service::DaemonService;
use crate::tests::support::{ScriptedService, SharedBuffer, Trace};

struct Ticker {
    refuse: bool,
}

impl Daemon for Ticker {
    fn run_cycle(&mut self, cycle: &mut Cycle<'_>) -> Result<(), BoxError> {
        cycle.log(LogLevel::Info, &format!("tick {}", cycle.number()));
        Ok(())
    }

    fn validate(&self) -> bool {
        !self.refuse
    }

    fn register_operations(operations: &mut OperationTable<Self>) -> Result<(), OperationError> {
        operations.add("status", status)
    }
}

fn status(controller: &mut DaemonController<Ticker>) -> Result<(), ControllerError> {
    let running = controller.is_running()?;
    controller.log(LogLevel::Info, &format!("running: {running}"));
    Ok(())
}

impl DaemonCommand for Ticker {
    const NAME: &'static str = "test:ticker";
    const ABOUT: &'static str = "Counts cycles";

    fn configure(command: Command) -> Command {
        command.arg(
            Arg::new("refuse")
                .long("refuse")
                .action(ArgAction::SetTrue)
                .help("Fail validation"),
        )
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, BoxError> {
        Ok(Self {
            refuse: matches.get_flag("refuse"),
        })
    }
}

struct Harness {
    dir: TempDir,
    trace: Trace,
    stdout: SharedBuffer,
    stderr: Vec<u8>,
}

impl Harness {
    fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().to_path_buf()).expect("utf-8 temp dir")
    }

    fn catalogue(&self) -> Utf8PathBuf {
        self.root().join("daemons.toml")
    }

    fn write_catalogue(&self) {
        let root = self.root();
        fs::write(
            self.catalogue(),
            format!(
                r#"
[daemons.test_ticker]
app_name = "ticker"
log_dir = "{root}/log"
app_pid_dir = "{root}/run"
sys_memory_limit = "0"
"#
            ),
        )
        .expect("write catalogue");
    }

    fn application(&self, initially_running: bool, cycles: usize) -> Application {
        let trace = Rc::clone(&self.trace);
        Application::new("treadle-test")
            .register::<Ticker>()
            .with_service_factory(move |_: &str| -> Box<dyn DaemonService> {
                if initially_running {
                    Box::new(ScriptedService::running(&trace, cycles))
                } else {
                    Box::new(ScriptedService::stopped(&trace, cycles))
                }
            })
    }

    fn run(&mut self, application: &Application, command: &[&str]) -> ExitCode {
        let mut args = vec![
            "treadle-test".to_owned(),
            "--daemons-path".to_owned(),
            self.catalogue().to_string(),
        ];
        args.extend(command.iter().map(|arg| (*arg).to_owned()));
        application.run(args, self.stdout.clone(), &mut self.stderr)
    }

    fn stderr(&self) -> String {
        String::from_utf8(self.stderr.clone()).expect("utf-8 stderr")
    }

    fn trace(&self) -> Vec<String> {
        self.trace.borrow().clone()
    }
}

#[fixture]
fn harness() -> Harness {
    let harness = Harness {
        dir: TempDir::new().expect("temp dir"),
        trace: Rc::new(RefCell::new(Vec::new())),
        stdout: SharedBuffer::default(),
        stderr: Vec::new(),
    };
    harness.write_catalogue();
    harness
}

#[rstest]
fn start_initialises_service_and_runs_cycles(mut harness: Harness) {
    let application = harness.application(false, 2);

    let exit = harness.run(&application, &["test:ticker", "start"]);

    assert_eq!(exit, ExitCode::SUCCESS, "stderr: {}", harness.stderr());
    assert_eq!(
        harness.trace(),
        ["service.initialize", "service.start", "service.stop"]
    );
    assert!(harness.stdout.contents().is_empty());
}

#[rstest]
fn verbose_flag_echoes_lifecycle_messages(mut harness: Harness) {
    let application = harness.application(false, 2);

    let exit = harness.run(&application, &["test:ticker", "start", "--verbose"]);

    assert_eq!(exit, ExitCode::SUCCESS, "stderr: {}", harness.stderr());
    let output = harness.stdout.contents();
    assert!(output.contains("<info>tick 1</info>"));
    assert!(output.contains("<info>tick 2</info>"));
    assert!(!output.contains("tick 3"));
}

#[rstest]
fn unknown_operation_fails_before_service_is_created(mut harness: Harness) {
    let application = harness.application(false, 1);

    let exit = harness.run(&application, &["test:ticker", "reload"]);

    assert_eq!(exit, ExitCode::FAILURE);
    assert!(
        harness
            .stderr()
            .contains("unknown operation 'reload'; expected one of start|stop|restart|status")
    );
    assert!(harness.trace().is_empty());
}

#[rstest]
fn failed_validation_exits_without_touching_service(mut harness: Harness) {
    let application = harness.application(false, 1);

    let exit = harness.run(&application, &["test:ticker", "start", "--refuse"]);

    assert_eq!(exit, ExitCode::FAILURE);
    assert!(harness.stderr().contains("validation failed"));
    assert!(harness.trace().is_empty());
}

#[rstest]
fn missing_catalogue_entry_is_reported(mut harness: Harness) {
    fs::write(harness.catalogue(), "[daemons.other]\n").expect("rewrite catalogue");
    let application = harness.application(false, 1);

    let exit = harness.run(&application, &["test:ticker", "start"]);

    assert_eq!(exit, ExitCode::FAILURE);
    assert!(harness.stderr().contains("expected key 'test_ticker'"));
    assert!(harness.trace().is_empty());
}

#[rstest]
fn start_on_running_daemon_reports_already_running(mut harness: Harness) {
    let application = harness.application(true, 1);

    let exit = harness.run(&application, &["test:ticker", "start"]);

    assert_eq!(exit, ExitCode::FAILURE);
    assert!(
        harness
            .stderr()
            .contains("daemon 'test:ticker' is already running")
    );
    assert_eq!(harness.trace(), ["service.initialize"]);
}

#[rstest]
fn custom_operation_is_dispatched(mut harness: Harness) {
    let application = harness.application(true, 1);

    let exit = harness.run(&application, &["test:ticker", "status", "-v"]);

    assert_eq!(exit, ExitCode::SUCCESS, "stderr: {}", harness.stderr());
    assert!(harness.stdout.contents().contains("<info>running: true</info>"));
}

#[rstest]
fn help_lists_operations_on_stdout(mut harness: Harness) {
    let application = harness.application(false, 1);

    let exit = harness.run(&application, &["test:ticker", "--help"]);

    assert_eq!(exit, ExitCode::SUCCESS);
    assert!(harness.stdout.contents().contains("start|stop|restart|status"));
}

#[rstest]
fn missing_operation_is_a_usage_error(mut harness: Harness) {
    let application = harness.application(false, 1);

    let exit = harness.run(&application, &["test:ticker"]);

    assert_eq!(exit, ExitCode::FAILURE);
    assert!(harness.stderr().contains("OPERATION"));
}

#[rstest]
fn duplicate_registration_is_ignored() {
    let application = Application::new("treadle-test")
        .register::<Ticker>()
        .register::<Ticker>();

    assert_eq!(application.daemons().collect::<Vec<_>>(), ["test:ticker"]);
}
