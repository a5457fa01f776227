use crate::console::{LogLevel, Logger};
use crate::service::DaemonService;

/// Context handed to [`Daemon::run_cycle`](super::Daemon::run_cycle).
pub struct Cycle<'a> {
    number: u64,
    logger: &'a mut Logger,
    service: &'a mut dyn DaemonService,
}

impl<'a> Cycle<'a> {
    pub(super) fn new(
        number: u64,
        logger: &'a mut Logger,
        service: &'a mut dyn DaemonService,
    ) -> Self {
        Self {
            number,
            logger,
            service,
        }
    }

    /// One-based number of this cycle within the current lifecycle operation.
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }

    /// Records `message` through the controller's logger.
    pub fn log(&mut self, level: LogLevel, message: &str) {
        self.logger.log(level, message);
    }

    /// Asks the service to stop reporting the daemon as running, ending the
    /// loop after this cycle.
    pub fn request_shutdown(&mut self) {
        self.service.request_shutdown();
    }
}
