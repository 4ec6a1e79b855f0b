//! Deterministic in-memory collaborators for rehearsing chaos experiments
//! without touching live infrastructure. Used by the core's integration
//! tests; equally useful for dry-running an experiment definition before
//! pointing it at production.

pub mod actuator;
pub mod flaky;
pub mod metrics;
pub mod registry;

pub use actuator::RecordingActuator;
pub use flaky::FlakyMetricsSource;
pub use metrics::ScriptedMetricsSource;
pub use registry::StaticRegistry;
