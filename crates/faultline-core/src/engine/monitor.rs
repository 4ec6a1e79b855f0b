//! The monitoring polling loop.
//!
//! Runs as its own task so a panic inside it is contained by the join in
//! `ExperimentRunner::run` and can never skip rollback.

use std::time::Duration;

use crate::model::{Hypothesis, MetricSample};
use crate::probe::{self, SteadyStateProber};

use super::StopSignal;

/// Why the monitoring loop ended.
#[derive(Debug)]
pub(crate) enum MonitorEnd {
    /// The monitored window ran to completion.
    Elapsed,
    /// The rollback condition fired; no further sample was taken.
    Triggered,
    /// Stop requested by the caller. A normal path, not an error.
    Stopped,
    /// Monitoring could not continue (probe failure or task panic).
    Failed(String),
}

pub(crate) struct MonitorReport {
    pub samples: Vec<MetricSample>,
    /// Whether every steady-state sample taken stayed within the
    /// hypothesis threshold.
    pub all_steady: bool,
    pub end: MonitorEnd,
}

/// Poll the hypothesis metrics every `interval` until `duration` elapses,
/// the rollback condition fires, a probe fails, or a stop is requested.
///
/// Each tick samples the steady-state metric plus every other metric the
/// rollback condition references, so an `all` predicate over several
/// metrics is evaluated against readings from the same tick. A probe
/// failure ends the loop: monitoring must not continue blind.
pub(crate) async fn watch_steady_state(
    prober: SteadyStateProber,
    hypothesis: Hypothesis,
    duration: Duration,
    interval: Duration,
    mut stop: StopSignal,
) -> MonitorReport {
    let deadline = tokio::time::Instant::now() + duration;

    // Steady-state metric first, then the rest of the predicate's metrics.
    let mut metrics = vec![hypothesis.steady_state_metric.clone()];
    metrics.extend(
        hypothesis
            .rollback_condition
            .metrics()
            .into_iter()
            .filter(|m| *m != hypothesis.steady_state_metric)
            .map(String::from),
    );

    let mut samples = Vec::new();
    let mut all_steady = true;

    let end = 'poll: loop {
        tokio::select! {
            biased;
            _ = stop.stopped() => {
                tracing::info!("stop requested; ending monitoring");
                break 'poll MonitorEnd::Stopped;
            }
            _ = tokio::time::sleep_until(deadline) => break 'poll MonitorEnd::Elapsed,
            _ = tokio::time::sleep(interval) => {
                let mut tick = Vec::with_capacity(metrics.len());
                for metric in &metrics {
                    match prober.measure(metric).await {
                        Ok(sample) => tick.push(sample),
                        Err(e) => {
                            samples.append(&mut tick);
                            tracing::warn!(%metric, error = %e, "probe failed during monitoring");
                            break 'poll MonitorEnd::Failed(e.to_string());
                        }
                    }
                }

                // tick[0] is the steady-state metric by construction.
                if let Some(steady) = tick.first() {
                    if !probe::is_steady(steady, &hypothesis) {
                        tracing::warn!(
                            metric = %steady.metric,
                            value = steady.value,
                            threshold = hypothesis.steady_state_threshold,
                            "steady state drifted outside threshold"
                        );
                        all_steady = false;
                    }
                }

                let triggered = hypothesis.rollback_condition.matches(&tick);
                samples.append(&mut tick);
                if triggered {
                    tracing::warn!("rollback condition fired");
                    break 'poll MonitorEnd::Triggered;
                }
            }
        }
    };

    MonitorReport {
        samples,
        all_steady,
        end,
    }
}
