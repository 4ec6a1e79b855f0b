//! Experiment definition types.
//!
//! Everything a caller submits is plain serializable data (see
//! [`crate::predicate`] for the rollback-condition tree), loadable from a
//! YAML file and immutable once a run starts.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ExperimentError;
use crate::predicate::Predicate;

/// One timestamped scalar measurement for a named metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric: String,
    pub value: f64,
    pub at: DateTime<Utc>,
}

impl MetricSample {
    pub fn now(metric: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            value,
            at: Utc::now(),
        }
    }
}

/// Direction of "acceptable" for the steady-state threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Acceptable while the metric stays at or below the threshold
    /// (e.g. an error rate).
    LessOrEqual,
    /// Acceptable while the metric stays at or above the threshold
    /// (e.g. a success rate).
    GreaterOrEqual,
}

impl Comparison {
    pub fn admits(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::LessOrEqual => value <= threshold,
            Comparison::GreaterOrEqual => value >= threshold,
        }
    }
}

/// The resilience hypothesis under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub steady_state_metric: String,
    pub steady_state_threshold: f64,
    pub comparison: Comparison,
    pub rollback_condition: Predicate,
    /// Free-text expectation, carried through to the result for reporting.
    /// Never machine-checked.
    #[serde(default)]
    pub expected_outcome: String,
}

impl Hypothesis {
    /// Every metric the run needs a data source for: the steady-state
    /// metric plus each metric referenced by the rollback condition.
    pub fn metrics(&self) -> BTreeSet<&str> {
        let mut names = self.rollback_condition.metrics();
        names.insert(self.steady_state_metric.as_str());
        names
    }
}

/// A single fault-injection action, opaque to the engine.
///
/// `action` and `target` are passed through to the actuator untouched;
/// `parameters` carry injector-specific knobs (latency, signal, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentStep {
    pub action: String,
    pub target: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl ExperimentStep {
    /// The same action, re-aimed at one concrete target. Used to
    /// materialize one injection per selected target.
    pub fn for_target(&self, target: &str) -> ExperimentStep {
        ExperimentStep {
            action: self.action.clone(),
            target: target.to_string(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Upper bound on the fraction of the eligible population a run may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlastRadiusSpec {
    pub percentage: u32,
}

impl BlastRadiusSpec {
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.percentage == 0 || self.percentage > 100 {
            return Err(ExperimentError::InvalidBlastRadius(self.percentage));
        }
        Ok(())
    }
}

/// A complete experiment definition: what to hypothesize, what to inject,
/// against whom, and for how long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    pub hypothesis: Hypothesis,
    pub steps: Vec<ExperimentStep>,
    pub blast_radius: BlastRadiusSpec,
    /// Selector handed to the target registry to resolve the eligible
    /// population.
    pub selector: String,
    /// Length of the monitored window once injection has succeeded.
    pub duration_secs: u64,
}

impl ExperimentConfig {
    pub fn from_yaml(s: &str) -> anyhow::Result<Self> {
        let cfg: ExperimentConfig = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&raw)
    }

    /// Structural checks that need no collaborator: blast radius in range,
    /// at least one step, a monitored window of nonzero length. Metric
    /// registration is checked by the runner, which owns the metrics
    /// source.
    pub fn validate(&self) -> Result<(), ExperimentError> {
        self.blast_radius.validate()?;
        if self.steps.is_empty() {
            return Err(ExperimentError::InvalidHypothesis(
                "experiment defines no steps; an empty experiment would report a false success"
                    .into(),
            ));
        }
        if self.duration_secs == 0 {
            return Err(ExperimentError::InvalidHypothesis(
                "monitored duration must be nonzero".into(),
            ));
        }
        Ok(())
    }

    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.duration_secs)
    }
}
