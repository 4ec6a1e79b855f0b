//! Collaborator seams.
//!
//! The engine treats all three as intrinsically unreliable external
//! services: every call is bounded by a timeout at the call site, and a
//! timeout is a call failure, never "unknown".

use std::time::Duration;

use async_trait::async_trait;

use crate::model::{ExperimentStep, MetricSample};

/// Live metric readings (a time-series store, a metrics gateway, ...).
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetch one current value for `metric`. Must return within `timeout`
    /// or fail; a stale value must not be returned unmarked.
    async fn fetch(&self, metric: &str, timeout: Duration) -> anyhow::Result<MetricSample>;

    /// Whether a data source is registered for `metric`. Backs hypothesis
    /// validation at submission time.
    fn is_registered(&self, metric: &str) -> bool;
}

/// Applies and reverses one concrete fault-injection action.
#[async_trait]
pub trait ChaosActuator: Send + Sync {
    async fn apply(&self, step: &ExperimentStep) -> anyhow::Result<()>;

    /// Must be idempotent: reverting a step that was never applied, or
    /// reverting twice, is Ok and has no effect.
    async fn revert(&self, step: &ExperimentStep) -> anyhow::Result<()>;
}

/// Supplies the population a selector resolves to.
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    async fn list_eligible(&self, selector: &str) -> anyhow::Result<Vec<String>>;
}
