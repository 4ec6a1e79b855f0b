//! Steady-state probing.

use std::sync::Arc;
use std::time::Duration;

use crate::errors::ExperimentError;
use crate::model::{Hypothesis, MetricSample};
use crate::providers::MetricsSource;

/// Fetches current metric values and decides whether they look like
/// "normal" per a hypothesis.
#[derive(Clone)]
pub struct SteadyStateProber {
    source: Arc<dyn MetricsSource>,
    timeout: Duration,
}

impl SteadyStateProber {
    pub fn new(source: Arc<dyn MetricsSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// One current value for `metric`.
    ///
    /// The probe timeout is passed to the collaborator and enforced
    /// locally as well, so a source that ignores its timeout argument
    /// still cannot hang the run. Both a timeout and a collaborator error
    /// surface as `MetricUnavailable`; the caller fails closed on either.
    pub async fn measure(&self, metric: &str) -> Result<MetricSample, ExperimentError> {
        match tokio::time::timeout(self.timeout, self.source.fetch(metric, self.timeout)).await {
            Err(_) => Err(ExperimentError::MetricUnavailable {
                metric: metric.to_string(),
                reason: format!("probe timed out after {:?}", self.timeout),
            }),
            Ok(Err(e)) => Err(ExperimentError::MetricUnavailable {
                metric: metric.to_string(),
                reason: format!("{e:#}"),
            }),
            Ok(Ok(sample)) => Ok(sample),
        }
    }

    pub fn is_registered(&self, metric: &str) -> bool {
        self.source.is_registered(metric)
    }
}

/// Pure comparison of a sample against the hypothesis threshold. No side
/// effects.
pub fn is_steady(sample: &MetricSample, hypothesis: &Hypothesis) -> bool {
    hypothesis
        .comparison
        .admits(sample.value, hypothesis.steady_state_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Comparison;
    use crate::predicate::{Op, Predicate};

    fn hypothesis(comparison: Comparison, threshold: f64) -> Hypothesis {
        Hypothesis {
            steady_state_metric: "error_rate".into(),
            steady_state_threshold: threshold,
            comparison,
            rollback_condition: Predicate::threshold("error_rate", Op::Gt, 0.3),
            expected_outcome: String::new(),
        }
    }

    #[test]
    fn steady_below_a_max_threshold() {
        let hyp = hypothesis(Comparison::LessOrEqual, 0.1);
        assert!(is_steady(&MetricSample::now("error_rate", 0.05), &hyp));
        assert!(is_steady(&MetricSample::now("error_rate", 0.1), &hyp));
        assert!(!is_steady(&MetricSample::now("error_rate", 0.5), &hyp));
    }

    #[test]
    fn steady_above_a_min_threshold() {
        let hyp = hypothesis(Comparison::GreaterOrEqual, 0.99);
        assert!(is_steady(&MetricSample::now("availability", 0.999), &hyp));
        assert!(!is_steady(&MetricSample::now("availability", 0.95), &hyp));
    }
}
