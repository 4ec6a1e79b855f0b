//! Fixed target populations.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use faultline_core::providers::TargetRegistry;

/// Selector-to-population map. Unknown selectors resolve to an empty
/// population; selectors can be marked failing to rehearse a control
/// plane outage.
#[derive(Default)]
pub struct StaticRegistry {
    populations: HashMap<String, Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_population<I, T>(mut self, selector: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.populations
            .insert(selector.into(), targets.into_iter().map(Into::into).collect());
        self
    }

    pub fn fail_selector(&self, selector: &str) {
        self.failing.lock().unwrap().insert(selector.to_string());
    }
}

#[async_trait]
impl TargetRegistry for StaticRegistry {
    async fn list_eligible(&self, selector: &str) -> anyhow::Result<Vec<String>> {
        if self.failing.lock().unwrap().contains(selector) {
            anyhow::bail!("registry lookup failed for '{selector}'");
        }
        Ok(self.populations.get(selector).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_selector_is_an_empty_population() {
        let registry = StaticRegistry::new().with_population("service:checkout", ["i-1", "i-2"]);
        assert_eq!(
            registry.list_eligible("service:checkout").await.unwrap(),
            vec!["i-1", "i-2"]
        );
        assert!(registry.list_eligible("service:search").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_selector_errors() {
        let registry = StaticRegistry::new().with_population("service:checkout", ["i-1"]);
        registry.fail_selector("service:checkout");
        assert!(registry.list_eligible("service:checkout").await.is_err());
    }
}
