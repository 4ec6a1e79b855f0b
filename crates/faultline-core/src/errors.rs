use thiserror::Error;

/// Failure taxonomy for an experiment run.
///
/// Precondition variants (`EmptyPopulation`, `InvalidHypothesis`,
/// `InvalidBlastRadius`) are raised before any side effect. Everything else
/// is folded into the run's `failure_reason`; `ExperimentRunner::run` never
/// propagates an error to its caller.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("eligible population is empty")]
    EmptyPopulation,

    #[error("invalid hypothesis: {0}")]
    InvalidHypothesis(String),

    #[error("blast radius percentage must be in 1..=100, got {0}")]
    InvalidBlastRadius(u32),

    #[error("metric '{metric}' unavailable: {reason}")]
    MetricUnavailable { metric: String, reason: String },

    #[error("injection failed for action '{action}' on '{target}': {reason}")]
    InjectionFailed {
        action: String,
        target: String,
        reason: String,
    },

    #[error("rollback incomplete, targets not restored: {}", targets.join(", "))]
    RollbackIncomplete { targets: Vec<String> },

    #[error("target registry unavailable: {0}")]
    RegistryUnavailable(String),
}
