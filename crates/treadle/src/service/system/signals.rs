use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::SigId;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::flag;
use tracing::{debug, info};

use super::SERVICE_TARGET;
use crate::service::ServiceError;

const SHUTDOWN_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Clonable handle used to ask a running daemon to stop after its current
/// cycle.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Builds a handle with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown; observed at the next cycle boundary.
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            info!(target: SERVICE_TARGET, "shutdown requested");
        }
    }

    /// Reports whether shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub(super) fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.requested)
    }
}

/// Termination signal handlers that set the shutdown flag; unregistered on
/// drop.
#[derive(Debug)]
pub(super) struct SignalFlags {
    ids: Vec<SigId>,
}

impl SignalFlags {
    pub(super) fn install(handle: &ShutdownHandle) -> Result<Self, ServiceError> {
        let mut ids = Vec::with_capacity(SHUTDOWN_SIGNALS.len());
        for signal in SHUTDOWN_SIGNALS {
            match flag::register(signal, handle.flag()) {
                Ok(id) => ids.push(id),
                Err(source) => {
                    for id in ids {
                        signal_hook::low_level::unregister(id);
                    }
                    return Err(ServiceError::SignalHandlers { source });
                }
            }
        }
        debug!(target: SERVICE_TARGET, "shutdown signal handlers installed");
        Ok(Self { ids })
    }
}

impl Drop for SignalFlags {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}
