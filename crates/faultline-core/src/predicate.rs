//! Rollback conditions as data.
//!
//! A `Predicate` is a small boolean-expression tree over
//! `(metric, operator, threshold)` leaves combined with `all`/`any`. It is
//! plain serializable data, never a closure, so experiment definitions can
//! be stored, diffed, and audited without executing anything.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::MetricSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Gt,
    Ge,
    Lt,
    Le,
}

impl Op {
    fn compare(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Op::Gt => lhs > rhs,
            Op::Ge => lhs >= rhs,
            Op::Lt => lhs < rhs,
            Op::Le => lhs <= rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Threshold { metric: String, op: Op, value: f64 },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Evaluate against one polling tick's worth of samples.
    ///
    /// A leaf resolves its metric by name among `samples`; a leaf whose
    /// metric is absent is `false`. A rollback condition never fires on
    /// missing data; missing data is surfaced separately as a probe
    /// failure.
    pub fn matches(&self, samples: &[MetricSample]) -> bool {
        match self {
            Predicate::Threshold { metric, op, value } => samples
                .iter()
                .find(|s| s.metric == *metric)
                .is_some_and(|s| op.compare(s.value, *value)),
            Predicate::All(preds) => preds.iter().all(|p| p.matches(samples)),
            Predicate::Any(preds) => preds.iter().any(|p| p.matches(samples)),
        }
    }

    /// Distinct metric names referenced anywhere in the tree.
    pub fn metrics(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_metrics(&mut out);
        out
    }

    fn collect_metrics<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Predicate::Threshold { metric, .. } => {
                out.insert(metric.as_str());
            }
            Predicate::All(preds) | Predicate::Any(preds) => {
                for p in preds {
                    p.collect_metrics(out);
                }
            }
        }
    }

    /// Convenience leaf constructor.
    pub fn threshold(metric: impl Into<String>, op: Op, value: f64) -> Self {
        Predicate::Threshold {
            metric: metric.into(),
            op,
            value,
        }
    }
}
