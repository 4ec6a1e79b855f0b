//! Seeded random faults on top of another metrics source.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use faultline_core::model::MetricSample;
use faultline_core::providers::MetricsSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Wraps a metrics source and fails a fraction of fetches.
///
/// Seeded, so a soak run that shook out a bug can be replayed exactly.
pub struct FlakyMetricsSource<S> {
    inner: S,
    rng: Mutex<StdRng>,
    fault_probability: f64,
}

impl<S: MetricsSource> FlakyMetricsSource<S> {
    pub fn new(inner: S, seed: u64, fault_probability: f64) -> Self {
        Self {
            inner,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            fault_probability,
        }
    }
}

#[async_trait]
impl<S: MetricsSource> MetricsSource for FlakyMetricsSource<S> {
    async fn fetch(&self, metric: &str, timeout: Duration) -> anyhow::Result<MetricSample> {
        let roll: f64 = self.rng.lock().unwrap().gen();
        if roll < self.fault_probability {
            anyhow::bail!("chaos: simulated metrics fault for '{metric}'");
        }
        self.inner.fetch(metric, timeout).await
    }

    fn is_registered(&self, metric: &str) -> bool {
        self.inner.is_registered(metric)
    }
}
