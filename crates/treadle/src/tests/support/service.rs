use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mockall::mock;
use treadle_config::DaemonOptions;

use crate::service::{DaemonService, ServiceError};

/// Ordered record of service transitions, hooks and work calls.
pub(crate) type Trace = Rc<RefCell<Vec<String>>>;

mock! {
    pub(crate) Service {}
    impl DaemonService for Service {
        fn initialize(&mut self, options: &DaemonOptions) -> Result<(), ServiceError>;
        fn is_running(&self) -> Result<bool, ServiceError>;
        fn start(&mut self) -> Result<(), ServiceError>;
        fn stop(&mut self) -> Result<(), ServiceError>;
        fn restart(&mut self) -> Result<(), ServiceError>;
        fn request_shutdown(&mut self);
    }
}

/// Service that reports the daemon running for a fixed number of loop
/// checks after each `start` or `restart`.
pub(crate) struct ScriptedService {
    trace: Trace,
    running: Cell<bool>,
    remaining: Cell<usize>,
    cycles: usize,
}

impl ScriptedService {
    pub(crate) fn stopped(trace: &Trace, cycles: usize) -> Self {
        Self {
            trace: Rc::clone(trace),
            running: Cell::new(false),
            remaining: Cell::new(0),
            cycles,
        }
    }

    pub(crate) fn running(trace: &Trace, cycles: usize) -> Self {
        Self {
            trace: Rc::clone(trace),
            running: Cell::new(true),
            remaining: Cell::new(usize::MAX),
            cycles,
        }
    }

    fn record(&self, entry: &str) {
        self.trace.borrow_mut().push(entry.to_owned());
    }
}

impl DaemonService for ScriptedService {
    fn initialize(&mut self, _options: &DaemonOptions) -> Result<(), ServiceError> {
        self.record("service.initialize");
        Ok(())
    }

    fn is_running(&self) -> Result<bool, ServiceError> {
        if !self.running.get() {
            return Ok(false);
        }
        let remaining = self.remaining.get();
        if remaining == 0 {
            return Ok(false);
        }
        self.remaining.set(remaining - 1);
        Ok(true)
    }

    fn start(&mut self) -> Result<(), ServiceError> {
        self.record("service.start");
        self.running.set(true);
        self.remaining.set(self.cycles);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ServiceError> {
        self.record("service.stop");
        self.running.set(false);
        Ok(())
    }

    fn restart(&mut self) -> Result<(), ServiceError> {
        self.record("service.restart");
        self.running.set(true);
        self.remaining.set(self.cycles);
        Ok(())
    }

    fn request_shutdown(&mut self) {
        self.record("service.request_shutdown");
        self.remaining.set(0);
    }
}
