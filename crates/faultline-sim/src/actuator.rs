//! Recording fault actuator.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use faultline_core::model::ExperimentStep;
use faultline_core::providers::ChaosActuator;

/// An actuator that records every apply and revert in order, tracks which
/// faults are currently live, and can be programmed to fail specific
/// calls. Revert is idempotent per the actuator contract: reverting a
/// step that is not live is recorded and succeeds without effect.
#[derive(Default)]
pub struct RecordingActuator {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    applies_seen: usize,
    fail_apply_at: Option<usize>,
    fail_apply_on: HashSet<(String, String)>,
    fail_revert_on: HashSet<(String, String)>,
    applied_log: Vec<(String, String)>,
    revert_log: Vec<(String, String)>,
    live: HashSet<(String, String)>,
}

fn key(step: &ExperimentStep) -> (String, String) {
    (step.action.clone(), step.target.clone())
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th apply call (1-based), whatever it is.
    pub fn fail_nth_apply(&self, n: usize) {
        self.inner.lock().unwrap().fail_apply_at = Some(n);
    }

    pub fn fail_apply_for(&self, action: &str, target: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_apply_on
            .insert((action.to_string(), target.to_string()));
    }

    /// The named fault stays live when its revert is attempted.
    pub fn fail_revert_for(&self, action: &str, target: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_revert_on
            .insert((action.to_string(), target.to_string()));
    }

    /// `(action, target)` pairs in application order.
    pub fn applied(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().applied_log.clone()
    }

    /// `(action, target)` pairs in the order reverts were attempted,
    /// including idempotent no-ops.
    pub fn revert_order(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().revert_log.clone()
    }

    /// Faults applied and not successfully reverted, sorted.
    pub fn live(&self) -> Vec<(String, String)> {
        let mut live: Vec<_> = self.inner.lock().unwrap().live.iter().cloned().collect();
        live.sort();
        live
    }

    pub fn is_live(&self, action: &str, target: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .live
            .contains(&(action.to_string(), target.to_string()))
    }
}

#[async_trait]
impl ChaosActuator for RecordingActuator {
    async fn apply(&self, step: &ExperimentStep) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.applies_seen += 1;
        let key = key(step);
        if inner.fail_apply_at == Some(inner.applies_seen) || inner.fail_apply_on.contains(&key) {
            anyhow::bail!(
                "simulated apply failure for '{}' on '{}'",
                step.action,
                step.target
            );
        }
        inner.applied_log.push(key.clone());
        inner.live.insert(key);
        Ok(())
    }

    async fn revert(&self, step: &ExperimentStep) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let key = key(step);
        if !inner.live.contains(&key) {
            // Idempotent: never applied, or already reverted.
            inner.revert_log.push(key);
            return Ok(());
        }
        if inner.fail_revert_on.contains(&key) {
            inner.revert_log.push(key);
            anyhow::bail!(
                "simulated revert failure for '{}' on '{}'",
                step.action,
                step.target
            );
        }
        inner.live.remove(&key);
        inner.revert_log.push(key);
        Ok(())
    }
}
