use std::rc::Rc;

use strum::IntoEnumIterator;

use super::Trace;
use crate::BoxError;
use crate::controller::{Cycle, Daemon, DaemonController, Events};
use crate::events::Phase;

/// Daemon that records each work call and can fail on a chosen cycle.
pub(crate) struct Recorder {
    trace: Trace,
    fail_on: Option<u64>,
    stop_after: Option<u64>,
}

impl Recorder {
    pub(crate) fn new(trace: &Trace) -> Self {
        Self {
            trace: Rc::clone(trace),
            fail_on: None,
            stop_after: None,
        }
    }

    pub(crate) const fn failing_on(mut self, cycle: u64) -> Self {
        self.fail_on = Some(cycle);
        self
    }

    pub(crate) const fn stopping_after(mut self, cycle: u64) -> Self {
        self.stop_after = Some(cycle);
        self
    }
}

impl Daemon for Recorder {
    fn run_cycle(&mut self, cycle: &mut Cycle<'_>) -> Result<(), BoxError> {
        self.trace.borrow_mut().push("work".to_owned());
        if self.fail_on == Some(cycle.number()) {
            return Err(format!("work failed in cycle {}", cycle.number()).into());
        }
        if self.stop_after == Some(cycle.number()) {
            cycle.request_shutdown();
        }
        Ok(())
    }
}

/// Registers a hook on every phase that appends the phase name to `trace`.
pub(crate) fn record_phases<D: Daemon>(events: &mut Events<D>, trace: &Trace) {
    for phase in Phase::iter() {
        let sink = Rc::clone(trace);
        events
            .add_event(phase, "trace", move |_: &mut DaemonController<D>| {
                sink.borrow_mut().push(phase.to_string());
                Ok(())
            })
            .expect("trace hook should register");
    }
}
