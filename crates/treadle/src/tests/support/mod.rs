//! Shared doubles for the controller and command suites.

mod buffer;
mod daemon;
mod service;

pub(crate) use buffer::SharedBuffer;
pub(crate) use daemon::{Recorder, record_phases};
pub(crate) use service::{MockService, ScriptedService, Trace};
