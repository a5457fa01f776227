//! Named lifecycle hooks grouped by phase.
//!
//! The [`EventRegistry`] maps each [`Phase`] to an ordered list of named
//! hooks. Hook names are unique within a phase: registering an existing name
//! replaces the hook in place, keeping its original position.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use strum::{Display, EnumIter};
use thiserror::Error;
use tracing::debug;

use crate::BoxError;

const EVENTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::events");

/// Lifecycle moments at which hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Phase {
    /// After the service has started, before the first cycle.
    #[strum(serialize = "EVENT_START")]
    Start,
    /// Before each invocation of the unit of work.
    #[strum(serialize = "EVENT_CYCLE_START")]
    CycleStart,
    /// After each invocation of the unit of work.
    #[strum(serialize = "EVENT_CYCLE_END")]
    CycleEnd,
    /// Before the service is stopped.
    #[strum(serialize = "EVENT_STOP")]
    Stop,
}

/// Outcome of a hook invocation.
pub type HookResult = Result<(), BoxError>;

/// Shared reference to a hook receiving the controller `C`.
pub type Hook<C> = Rc<dyn Fn(&mut C) -> HookResult>;

/// A hook together with the name it was registered under.
pub struct NamedHook<C> {
    name: String,
    hook: Hook<C>,
}

impl<C> NamedHook<C> {
    /// Name the hook was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The registered hook.
    #[must_use]
    pub fn hook(&self) -> &Hook<C> {
        &self.hook
    }
}

impl<C> Clone for NamedHook<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            hook: Rc::clone(&self.hook),
        }
    }
}

impl<C> fmt::Debug for NamedHook<C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NamedHook")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Errors raised while registering hooks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    /// The hook name was blank or contained control characters.
    #[error("invalid hook name {name:?} for {phase}; names must be non-blank printable text")]
    InvalidName {
        /// Phase the hook was registered for.
        phase: Phase,
        /// Rejected name.
        name: String,
    },
}

/// Registry of hooks keyed by phase and name.
///
/// `C` is the type handed to each hook when it runs, normally a
/// [`DaemonController`](crate::DaemonController).
pub struct EventRegistry<C> {
    hooks: HashMap<Phase, Vec<NamedHook<C>>>,
}

impl<C> Default for EventRegistry<C> {
    fn default() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }
}

impl<C> fmt::Debug for EventRegistry<C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = formatter.debug_map();
        for (phase, hooks) in &self.hooks {
            let names: Vec<&str> = hooks.iter().map(NamedHook::name).collect();
            map.entry(phase, &names);
        }
        map.finish()
    }
}

impl<C> EventRegistry<C> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook` for `phase` under `name`.
    ///
    /// A hook already registered under the same phase and name is replaced and
    /// keeps its position in the run order.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidName`] when `name` is blank or contains
    /// control characters.
    pub fn add_event<F>(
        &mut self,
        phase: Phase,
        name: impl Into<String>,
        hook: F,
    ) -> Result<(), EventError>
    where
        F: Fn(&mut C) -> HookResult + 'static,
    {
        let key = validate_name(phase, name.into())?;
        let hook: Hook<C> = Rc::new(hook);
        let hooks = self.hooks.entry(phase).or_default();
        if let Some(existing) = hooks.iter_mut().find(|entry| entry.name == key) {
            debug!(target: EVENTS_TARGET, %phase, name = %key, "replacing hook");
            existing.hook = hook;
        } else {
            debug!(target: EVENTS_TARGET, %phase, name = %key, "registering hook");
            hooks.push(NamedHook { name: key, hook });
        }
        Ok(())
    }

    /// Removes the hook registered for `phase` under `name`.
    ///
    /// Returns `true` when a hook was removed; removing an unknown hook is not
    /// an error.
    pub fn remove_event(&mut self, phase: Phase, name: &str) -> bool {
        let Some(hooks) = self.hooks.get_mut(&phase) else {
            return false;
        };
        let before = hooks.len();
        hooks.retain(|entry| entry.name != name);
        let removed = hooks.len() != before;
        if hooks.is_empty() {
            self.hooks.remove(&phase);
        }
        removed
    }

    /// Hooks registered for `phase`, in run order.
    #[must_use]
    pub fn events(&self, phase: Phase) -> &[NamedHook<C>] {
        self.hooks
            .get(&phase)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Looks up a single hook.
    #[must_use]
    pub fn get(&self, phase: Phase, name: &str) -> Option<&Hook<C>> {
        self.events(phase)
            .iter()
            .find(|entry| entry.name == name)
            .map(NamedHook::hook)
    }

    /// Returns `true` when a hook is registered for `phase` under `name`.
    #[must_use]
    pub fn contains(&self, phase: Phase, name: &str) -> bool {
        self.get(phase, name).is_some()
    }

    /// Total number of registered hooks across all phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    /// Returns `true` when no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Removes every hook from every phase.
    pub fn clear(&mut self) {
        self.hooks.clear();
    }

    /// Copies the hooks of `phase` so they can run while the registry is
    /// borrowed mutably.
    pub(crate) fn snapshot(&self, phase: Phase) -> Vec<NamedHook<C>> {
        self.events(phase).to_vec()
    }
}

fn validate_name(phase: Phase, name: String) -> Result<String, EventError> {
    if name.trim().is_empty() || name.chars().any(char::is_control) {
        return Err(EventError::InvalidName { phase, name });
    }
    Ok(name)
}
