//! Crate-level behavioural suites and shared test doubles.

mod lifecycle_behaviour;
pub(crate) mod support;
