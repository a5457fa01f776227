//! Behavioural tests covering the controller lifecycle and hook dispatch.

use std::cell::RefCell;
use std::rc::Rc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::controller::{ControllerError, DaemonController, Lifecycle};
use crate::events::Phase;
use crate::service::DaemonService;
use crate::tests::support::{Recorder, ScriptedService, Trace, record_phases};

#[derive(Default)]
struct LifecycleWorld {
    trace: Trace,
    running: bool,
    cycles: usize,
    fail_on: Option<u64>,
    record_phases: bool,
    cycle_start_hooks: Vec<(String, String)>,
    outcome: Option<Result<(), ControllerError>>,
}

impl LifecycleWorld {
    fn service(&self) -> Box<dyn DaemonService> {
        if self.running {
            Box::new(ScriptedService::running(&self.trace, self.cycles))
        } else {
            Box::new(ScriptedService::stopped(&self.trace, self.cycles))
        }
    }

    fn controller(&self) -> DaemonController<Recorder> {
        let mut daemon = Recorder::new(&self.trace);
        if let Some(cycle) = self.fail_on {
            daemon = daemon.failing_on(cycle);
        }
        let mut controller =
            DaemonController::new("test:lifecycle", daemon, self.service()).expect("controller");
        if self.record_phases {
            record_phases(controller.events_mut(), &self.trace);
        }
        for (name, label) in &self.cycle_start_hooks {
            let sink = Rc::clone(&self.trace);
            let entry = label.clone();
            controller
                .events_mut()
                .add_event(
                    Phase::CycleStart,
                    name.as_str(),
                    move |_: &mut DaemonController<Recorder>| {
                        sink.borrow_mut().push(entry.clone());
                        Ok(())
                    },
                )
                .expect("hook registers");
        }
        controller
    }

    fn run(&mut self, operation: Lifecycle) {
        let mut controller = self.controller();
        let outcome = match operation {
            Lifecycle::Start => controller.start(),
            Lifecycle::Stop => controller.stop(),
            Lifecycle::Restart => controller.restart(),
        };
        self.outcome = Some(outcome);
    }

    fn error(&self) -> &ControllerError {
        match self.outcome.as_ref() {
            Some(Err(error)) => error,
            Some(Ok(())) => panic!("operation unexpectedly succeeded"),
            None => panic!("no operation was run"),
        }
    }

    fn recorded(&self) -> Vec<String> {
        self.trace.borrow().clone()
    }
}

#[fixture]
fn world() -> RefCell<LifecycleWorld> {
    RefCell::new(LifecycleWorld::default())
}

#[given("a stopped daemon service that runs for {cycles} cycles")]
fn given_stopped_service(world: &RefCell<LifecycleWorld>, cycles: usize) {
    let mut world = world.borrow_mut();
    world.running = false;
    world.cycles = cycles;
}

#[given("a running daemon service that runs for {cycles} cycles")]
fn given_running_service(world: &RefCell<LifecycleWorld>, cycles: usize) {
    let mut world = world.borrow_mut();
    world.running = true;
    world.cycles = cycles;
}

#[given("hooks recording every phase")]
fn given_phase_hooks(world: &RefCell<LifecycleWorld>) {
    world.borrow_mut().record_phases = true;
}

#[given("the work unit fails on cycle {cycle}")]
fn given_failing_work(world: &RefCell<LifecycleWorld>, cycle: u64) {
    world.borrow_mut().fail_on = Some(cycle);
}

#[given("a cycle start hook named \"{name}\" recording \"{label}\"")]
fn given_cycle_start_hook(world: &RefCell<LifecycleWorld>, name: String, label: String) {
    world.borrow_mut().cycle_start_hooks.push((name, label));
}

#[when("the daemon is started")]
fn when_started(world: &RefCell<LifecycleWorld>) {
    world.borrow_mut().run(Lifecycle::Start);
}

#[when("the daemon is stopped")]
fn when_stopped(world: &RefCell<LifecycleWorld>) {
    world.borrow_mut().run(Lifecycle::Stop);
}

#[when("the daemon is restarted")]
fn when_restarted(world: &RefCell<LifecycleWorld>) {
    world.borrow_mut().run(Lifecycle::Restart);
}

#[then("the operation succeeds")]
fn then_succeeds(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    assert!(
        matches!(world.outcome, Some(Ok(()))),
        "operation should succeed: {:?}",
        world.outcome
    );
}

#[then("the operation fails because the daemon is already running")]
fn then_already_running(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    assert!(matches!(world.error(), ControllerError::AlreadyRunning { .. }));
}

#[then("the operation fails because the daemon is not running")]
fn then_not_running(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    assert!(matches!(world.error(), ControllerError::NotRunning { .. }));
}

#[then("the operation fails with a work failure in cycle {cycle}")]
fn then_work_failure(world: &RefCell<LifecycleWorld>, cycle: u64) {
    let world = world.borrow();
    match world.error() {
        ControllerError::Work { cycle: failed, .. } => assert_eq!(*failed, cycle),
        other => panic!("unexpected error: {other}"),
    }
}

#[then("the trace reads \"{expected}\"")]
fn then_trace_reads(world: &RefCell<LifecycleWorld>, expected: String) {
    let entries: Vec<&str> = expected.split(", ").collect();
    assert_eq!(world.borrow().recorded(), entries);
}

#[then("the trace is empty")]
fn then_trace_empty(world: &RefCell<LifecycleWorld>) {
    assert!(world.borrow().recorded().is_empty());
}

#[scenario(
    path = "tests/features/daemon_lifecycle.feature",
    name = "Starting runs every cycle between the start and stop hooks"
)]
fn start_runs_cycles(#[from(world)] _: RefCell<LifecycleWorld>) {}

#[scenario(
    path = "tests/features/daemon_lifecycle.feature",
    name = "Starting a running daemon is refused"
)]
fn start_refused(#[from(world)] _: RefCell<LifecycleWorld>) {}

#[scenario(
    path = "tests/features/daemon_lifecycle.feature",
    name = "Stopping a stopped daemon is refused"
)]
fn stop_refused(#[from(world)] _: RefCell<LifecycleWorld>) {}

#[scenario(
    path = "tests/features/daemon_lifecycle.feature",
    name = "Stopping fires only the stop hooks"
)]
fn stop_fires_stop_hooks(#[from(world)] _: RefCell<LifecycleWorld>) {}

#[scenario(
    path = "tests/features/daemon_lifecycle.feature",
    name = "A failing work unit aborts a restart"
)]
fn work_failure_aborts_restart(#[from(world)] _: RefCell<LifecycleWorld>) {}

#[scenario(
    path = "tests/features/daemon_lifecycle.feature",
    name = "Re-registering a hook keeps its position"
)]
fn hook_replacement_keeps_position(#[from(world)] _: RefCell<LifecycleWorld>) {}
