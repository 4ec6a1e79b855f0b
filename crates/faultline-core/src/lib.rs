//! Chaos experiment engine.
//!
//! A caller submits an [`model::ExperimentConfig`]: a steady-state
//! hypothesis, fault-injection steps, a blast radius, and a monitored
//! duration. [`engine::ExperimentRunner`] verifies the baseline, injects
//! faults through a pluggable [`providers::ChaosActuator`] bounded by the
//! blast radius, watches live metrics against a serializable rollback
//! condition, and reverses every applied action on every termination
//! path: elapsed window, triggered rollback, injection failure,
//! cancellation, or a panic inside monitoring.

pub mod blast;
pub mod config;
pub mod engine;
pub mod errors;
pub mod model;
pub mod predicate;
pub mod probe;
pub mod providers;
pub mod report;

pub use engine::{stop_channel, ExperimentRunner, RunState, StopHandle, StopSignal};
pub use report::{AppliedAction, ExperimentResult, RunSummary};
