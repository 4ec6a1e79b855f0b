//! Scripted metrics.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use faultline_core::model::MetricSample;
use faultline_core::providers::MetricsSource;

/// A metrics source that replays scripted value sequences.
///
/// Each fetch pops the next scripted value; once a sequence is down to
/// its last value that value repeats forever, so a script only needs to
/// describe the interesting prefix of a run. Metrics can be failed at any
/// point to rehearse a backend outage, and an optional artificial latency
/// exercises probe timeouts.
#[derive(Default)]
pub struct ScriptedMetricsSource {
    state: Mutex<Inner>,
    latency: Option<Duration>,
}

#[derive(Default)]
struct Inner {
    series: HashMap<String, VecDeque<f64>>,
    failing: HashSet<String>,
    calls: HashMap<String, usize>,
}

impl ScriptedMetricsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps this long first.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn script(self, metric: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        self.state
            .lock()
            .unwrap()
            .series
            .insert(metric.into(), values.into_iter().collect());
        self
    }

    /// Subsequent fetches of `metric` fail until [`Self::heal_metric`].
    /// The metric stays registered: a broken backend is not an
    /// unregistered one.
    pub fn fail_metric(&self, metric: &str) {
        self.state.lock().unwrap().failing.insert(metric.to_string());
    }

    pub fn heal_metric(&self, metric: &str) {
        self.state.lock().unwrap().failing.remove(metric);
    }

    pub fn calls(&self, metric: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(metric)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl MetricsSource for ScriptedMetricsSource {
    async fn fetch(&self, metric: &str, _timeout: Duration) -> anyhow::Result<MetricSample> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut inner = self.state.lock().unwrap();
        *inner.calls.entry(metric.to_string()).or_default() += 1;
        if inner.failing.contains(metric) {
            anyhow::bail!("metrics backend unavailable for '{metric}'");
        }
        let series = inner
            .series
            .get_mut(metric)
            .ok_or_else(|| anyhow::anyhow!("no data source for '{metric}'"))?;
        let value = if series.len() > 1 {
            series.pop_front().expect("nonempty")
        } else {
            *series
                .front()
                .ok_or_else(|| anyhow::anyhow!("no data for '{metric}'"))?
        };
        Ok(MetricSample::now(metric, value))
    }

    fn is_registered(&self, metric: &str) -> bool {
        self.state.lock().unwrap().series.contains_key(metric)
    }
}
