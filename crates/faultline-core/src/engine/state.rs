//! Experiment lifecycle states.
//!
//! The transition graph is linear on purpose: a run must never loop back
//! into an earlier state once chaos has been applied. `Aborted` and
//! `Completed` are the only terminal states, and every path that enters
//! `Injecting` goes through `RollingBack`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::MetricSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    VerifyingSteadyState,
    Injecting,
    Monitoring,
    RollingBack,
    Completed,
    Aborted,
}

impl RunState {
    pub fn allowed_transitions(self) -> &'static [RunState] {
        use RunState::*;
        match self {
            Pending => &[VerifyingSteadyState, Aborted],
            VerifyingSteadyState => &[Injecting, Aborted],
            Injecting => &[Monitoring, RollingBack],
            Monitoring => &[RollingBack],
            RollingBack => &[Completed],
            Completed | Aborted => &[],
        }
    }

    pub fn can_transition_to(self, to: RunState) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Working state of one execution. Owned exclusively by the runner task
/// driving the experiment; converted into an `ExperimentResult` at the
/// end and never shared while mutable.
pub(crate) struct ExperimentRun {
    pub run_id: Uuid,
    pub experiment: String,
    pub state: RunState,
    pub baseline: Vec<MetricSample>,
    pub samples: Vec<MetricSample>,
    pub rollback_triggered: bool,
    pub started_at: DateTime<Utc>,
}

impl ExperimentRun {
    pub fn new(experiment: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            experiment: experiment.to_string(),
            state: RunState::Pending,
            baseline: Vec::new(),
            samples: Vec::new(),
            rollback_triggered: false,
            started_at: Utc::now(),
        }
    }

    pub fn transition(&mut self, to: RunState) {
        debug_assert!(
            self.state.can_transition_to(to),
            "illegal state transition {:?} -> {:?}",
            self.state,
            to
        );
        tracing::info!(
            run_id = %self.run_id,
            experiment = %self.experiment,
            from = ?self.state,
            to = ?to,
            "experiment state change"
        );
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_happy_path_is_legal() {
        use RunState::*;
        let path = [
            Pending,
            VerifyingSteadyState,
            Injecting,
            Monitoring,
            RollingBack,
            Completed,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{:?} -> {:?} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn injection_failure_skips_monitoring() {
        assert!(RunState::Injecting.can_transition_to(RunState::RollingBack));
    }

    #[test]
    fn no_path_loops_backwards() {
        use RunState::*;
        assert!(!Monitoring.can_transition_to(Injecting));
        assert!(!RollingBack.can_transition_to(Monitoring));
        assert!(!Injecting.can_transition_to(VerifyingSteadyState));
        // Once chaos is applied there is no direct abort: rollback first.
        assert!(!Injecting.can_transition_to(Aborted));
        assert!(!Monitoring.can_transition_to(Aborted));
    }

    #[test]
    fn terminal_states_allow_nothing() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Aborted.is_terminal());
        assert!(!RunState::Monitoring.is_terminal());
    }
}
