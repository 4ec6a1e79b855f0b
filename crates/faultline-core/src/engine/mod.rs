//! The experiment lifecycle orchestrator.

mod monitor;
mod state;

pub use state::RunState;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use crate::blast;
use crate::config::RunnerConfig;
use crate::errors::ExperimentError;
use crate::model::{ExperimentConfig, ExperimentStep};
use crate::probe::{self, SteadyStateProber};
use crate::providers::{ChaosActuator, MetricsSource, TargetRegistry};
use crate::report::{AppliedAction, ExperimentResult};

use monitor::{MonitorEnd, MonitorReport};
use state::ExperimentRun;

/// Caller-side handle to abort a run early. Stopping is a normal
/// termination path: monitoring ends and rollback still runs.
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// The runner's end of the stop channel.
#[derive(Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Resolves once a stop has been requested. Dropping every
    /// `StopHandle` without stopping never resolves this, so a caller
    /// that does not need cancellation can just drop the handle.
    pub(crate) async fn stopped(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Drives one experiment at a time through its lifecycle: verify steady
/// state, inject bounded by the blast radius, monitor against the
/// rollback condition, always roll back, report.
///
/// One instance per concurrent experiment; the working state of a run is
/// owned by the task executing [`ExperimentRunner::run`] and never
/// shared.
pub struct ExperimentRunner {
    metrics: Arc<dyn MetricsSource>,
    actuator: Arc<dyn ChaosActuator>,
    registry: Arc<dyn TargetRegistry>,
    config: RunnerConfig,
}

impl ExperimentRunner {
    pub fn new(
        metrics: Arc<dyn MetricsSource>,
        actuator: Arc<dyn ChaosActuator>,
        registry: Arc<dyn TargetRegistry>,
    ) -> Self {
        Self::with_config(metrics, actuator, registry, RunnerConfig::default())
    }

    pub fn with_config(
        metrics: Arc<dyn MetricsSource>,
        actuator: Arc<dyn ChaosActuator>,
        registry: Arc<dyn TargetRegistry>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            metrics,
            actuator,
            registry,
            config,
        }
    }

    /// Execute one experiment. Always returns a result: every
    /// collaborator failure is folded into `failure_reason` instead of
    /// propagating, so callers get a single return contract.
    pub async fn run(&self, cfg: &ExperimentConfig, stop: StopSignal) -> ExperimentResult {
        let mut run = ExperimentRun::new(&cfg.name);
        tracing::info!(
            run_id = %run.run_id,
            experiment = %cfg.name,
            selector = %cfg.selector,
            "starting chaos experiment"
        );

        // Preconditions reject before any side effect.
        if let Err(e) = self.validate(cfg) {
            return self.abort(run, cfg, e.to_string());
        }

        run.transition(RunState::VerifyingSteadyState);
        let prober = SteadyStateProber::new(self.metrics.clone(), self.config.probe_timeout());
        let baseline = match prober.measure(&cfg.hypothesis.steady_state_metric).await {
            Ok(sample) => sample,
            // Fail closed: a measurement error is never treated as steady.
            Err(e) => return self.abort(run, cfg, format!("steady state not established: {e}")),
        };
        let steady = probe::is_steady(&baseline, &cfg.hypothesis);
        let baseline_value = baseline.value;
        run.baseline.push(baseline);
        if !steady {
            return self.abort(
                run,
                cfg,
                format!(
                    "steady state not established: {}={} outside threshold {}",
                    cfg.hypothesis.steady_state_metric,
                    baseline_value,
                    cfg.hypothesis.steady_state_threshold
                ),
            );
        }

        // Population and blast radius are settled before the first
        // actuator call.
        let targets = match self.resolve_targets(cfg).await {
            Ok(targets) => targets,
            Err(e) => return self.abort(run, cfg, e.to_string()),
        };

        run.transition(RunState::Injecting);
        tracing::info!(
            run_id = %run.run_id,
            steps = cfg.steps.len(),
            targets = targets.len(),
            "injecting chaos"
        );
        let (mut applied, injection_error) = self.inject(&cfg.steps, &targets).await;

        // From here on every path goes through RollingBack.
        let mut failures: Vec<String> = Vec::new();
        let mut hypothesis_held = false;

        match injection_error {
            Some(e) => failures.push(e.to_string()),
            None => {
                run.transition(RunState::Monitoring);
                let report = self.monitor(cfg, stop).await;
                run.samples = report.samples;
                match report.end {
                    MonitorEnd::Elapsed => {
                        hypothesis_held = report.all_steady;
                        if !report.all_steady {
                            failures.push(
                                "steady state did not hold during the monitoring window".into(),
                            );
                        }
                    }
                    MonitorEnd::Triggered => {
                        run.rollback_triggered = true;
                        failures.push("rollback condition fired".into());
                    }
                    MonitorEnd::Stopped => {
                        failures.push(
                            "experiment cancelled before the monitoring window completed".into(),
                        );
                    }
                    MonitorEnd::Failed(reason) => failures.push(reason),
                }
            }
        }

        run.transition(RunState::RollingBack);
        let unrestored = self.roll_back(&mut applied).await;
        if !unrestored.is_empty() {
            failures.push(
                ExperimentError::RollbackIncomplete {
                    targets: unrestored,
                }
                .to_string(),
            );
        }

        run.transition(RunState::Completed);
        let success = hypothesis_held && failures.is_empty();
        let failure_reason = if failures.is_empty() {
            None
        } else {
            Some(failures.join("; "))
        };
        Self::finish(run, cfg, success, failure_reason, applied)
    }

    fn validate(&self, cfg: &ExperimentConfig) -> Result<(), ExperimentError> {
        cfg.validate()?;
        for metric in cfg.hypothesis.metrics() {
            if !self.metrics.is_registered(metric) {
                return Err(ExperimentError::InvalidHypothesis(format!(
                    "metric '{metric}' has no registered data source"
                )));
            }
        }
        Ok(())
    }

    async fn resolve_targets(&self, cfg: &ExperimentConfig) -> Result<Vec<String>, ExperimentError> {
        let timeout = self.config.registry_timeout();
        let eligible =
            match tokio::time::timeout(timeout, self.registry.list_eligible(&cfg.selector)).await {
                Err(_) => {
                    return Err(ExperimentError::RegistryUnavailable(format!(
                        "timed out after {timeout:?}"
                    )))
                }
                Ok(Err(e)) => return Err(ExperimentError::RegistryUnavailable(format!("{e:#}"))),
                Ok(Ok(population)) => population,
            };
        blast::select_targets(&eligible, &cfg.blast_radius)
    }

    /// Apply each step, in order, to each selected target, in order. The
    /// first failure stops injection; whatever was applied up to that
    /// point is returned for rollback.
    async fn inject(
        &self,
        steps: &[ExperimentStep],
        targets: &[String],
    ) -> (Vec<AppliedAction>, Option<ExperimentError>) {
        let timeout = self.config.actuator_timeout();
        let mut applied = Vec::new();
        for step in steps {
            for target in targets {
                let concrete = step.for_target(target);
                tracing::debug!(action = %concrete.action, target = %concrete.target, "applying chaos action");
                let reason = match tokio::time::timeout(timeout, self.actuator.apply(&concrete))
                    .await
                {
                    Ok(Ok(())) => {
                        applied.push(AppliedAction {
                            step: concrete,
                            reverted: false,
                        });
                        continue;
                    }
                    Ok(Err(e)) => format!("{e:#}"),
                    Err(_) => format!("timed out after {timeout:?}"),
                };
                tracing::warn!(action = %step.action, target = %target, %reason, "chaos action failed to apply");
                return (
                    applied,
                    Some(ExperimentError::InjectionFailed {
                        action: step.action.clone(),
                        target: target.clone(),
                        reason,
                    }),
                );
            }
        }
        (applied, None)
    }

    /// Run the monitoring loop on its own task and fold a panic into a
    /// monitoring failure, so rollback still happens.
    async fn monitor(&self, cfg: &ExperimentConfig, stop: StopSignal) -> MonitorReport {
        let prober = SteadyStateProber::new(self.metrics.clone(), self.config.probe_timeout());
        let handle = tokio::spawn(monitor::watch_steady_state(
            prober,
            cfg.hypothesis.clone(),
            cfg.duration(),
            self.config.poll_interval(),
            stop,
        ));
        match handle.await {
            Ok(report) => report,
            Err(e) => {
                let reason = if e.is_panic() {
                    "monitoring task panicked".to_string()
                } else {
                    format!("monitoring task failed: {e}")
                };
                tracing::error!(%reason, "monitoring did not complete");
                MonitorReport {
                    samples: Vec::new(),
                    all_steady: false,
                    end: MonitorEnd::Failed(reason),
                }
            }
        }
    }

    /// Revert every applied action in strict reverse order of
    /// application. Failures are logged and aggregated, never retried
    /// automatically, and never stop the remaining reverts; unrestored
    /// targets are returned for the operator to remediate.
    async fn roll_back(&self, applied: &mut [AppliedAction]) -> Vec<String> {
        let timeout = self.config.actuator_timeout();
        let mut unrestored = Vec::new();
        for action in applied.iter_mut().rev() {
            let step = &action.step;
            tracing::debug!(action = %step.action, target = %step.target, "reverting chaos action");
            match tokio::time::timeout(timeout, self.actuator.revert(step)).await {
                Ok(Ok(())) => action.reverted = true,
                Ok(Err(e)) => {
                    tracing::error!(
                        action = %step.action,
                        target = %step.target,
                        error = %format!("{e:#}"),
                        "revert failed; manual remediation required"
                    );
                    unrestored.push(step.target.clone());
                }
                Err(_) => {
                    tracing::error!(
                        action = %step.action,
                        target = %step.target,
                        "revert timed out; manual remediation required"
                    );
                    unrestored.push(step.target.clone());
                }
            }
        }
        unrestored
    }

    fn abort(&self, mut run: ExperimentRun, cfg: &ExperimentConfig, reason: String) -> ExperimentResult {
        tracing::warn!(run_id = %run.run_id, %reason, "experiment aborted before injection");
        run.transition(RunState::Aborted);
        Self::finish(run, cfg, false, Some(reason), Vec::new())
    }

    fn finish(
        run: ExperimentRun,
        cfg: &ExperimentConfig,
        success: bool,
        failure_reason: Option<String>,
        applied: Vec<AppliedAction>,
    ) -> ExperimentResult {
        let result = ExperimentResult {
            run_id: run.run_id,
            experiment: run.experiment,
            success,
            baseline: run.baseline,
            samples: run.samples,
            rollback_triggered: run.rollback_triggered,
            failure_reason,
            applied,
            expected_outcome: cfg.hypothesis.expected_outcome.clone(),
            final_state: run.state,
            started_at: run.started_at,
            ended_at: Utc::now(),
        };
        let summary = result.summary();
        tracing::info!(
            run_id = %result.run_id,
            success = result.success,
            rollback_triggered = result.rollback_triggered,
            state = ?result.final_state,
            samples = summary.samples,
            applied = summary.applied,
            revert_failures = summary.revert_failures,
            "experiment finished"
        );
        result
    }
}
