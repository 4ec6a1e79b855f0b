//! Immutable run output.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::engine::RunState;
use crate::model::{ExperimentStep, MetricSample};

/// One concrete injection that succeeded, and whether its reversal did.
///
/// The full step is kept (action, concrete target, parameters) so an
/// operator can re-issue the exact revert by hand when it failed.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedAction {
    pub step: ExperimentStep,
    pub reverted: bool,
}

/// The complete outcome of one experiment run.
///
/// Every raw sample collected (baseline plus monitoring window) is
/// included so the run can be re-analyzed independently later.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentResult {
    pub run_id: Uuid,
    pub experiment: String,
    /// True iff steady state held for the full monitored window, the
    /// rollback condition never fired, and injection and rollback both
    /// fully succeeded.
    pub success: bool,
    pub baseline: Vec<MetricSample>,
    pub samples: Vec<MetricSample>,
    pub rollback_triggered: bool,
    pub failure_reason: Option<String>,
    pub applied: Vec<AppliedAction>,
    /// Carried through from the hypothesis, for reporting only.
    pub expected_outcome: String,
    pub final_state: RunState,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub baseline_samples: usize,
    pub samples: usize,
    pub applied: usize,
    pub reverted: usize,
    pub revert_failures: usize,
}

impl ExperimentResult {
    pub fn summary(&self) -> RunSummary {
        let reverted = self.applied.iter().filter(|a| a.reverted).count();
        RunSummary {
            baseline_samples: self.baseline.len(),
            samples: self.samples.len(),
            applied: self.applied.len(),
            reverted,
            revert_failures: self.applied.len() - reverted,
        }
    }
}
