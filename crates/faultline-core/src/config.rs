//! Runner tuning knobs.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-call timeouts and the monitoring cadence. All collaborator calls
/// are bounded by one of these so a single unresponsive collaborator
/// cannot hang a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Bound on a single metrics fetch.
    pub probe_timeout_secs: u64,
    /// Bound on a single actuator apply/revert call.
    pub actuator_timeout_secs: u64,
    /// Bound on resolving the eligible population.
    pub registry_timeout_secs: u64,
    /// Gap between monitoring samples.
    pub poll_interval_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 5,
            actuator_timeout_secs: 10,
            registry_timeout_secs: 5,
            poll_interval_secs: 10,
        }
    }
}

impl RunnerConfig {
    pub fn from_yaml(s: &str) -> anyhow::Result<Self> {
        let cfg: RunnerConfig = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&raw)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.probe_timeout_secs == 0
            || self.actuator_timeout_secs == 0
            || self.registry_timeout_secs == 0
            || self.poll_interval_secs == 0
        {
            anyhow::bail!("runner timeouts and poll interval must be nonzero");
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn actuator_timeout(&self) -> Duration {
        Duration::from_secs(self.actuator_timeout_secs)
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
