use crate::collectors::config::CollectorConfig;
use crate::collectors::{Collector, CollectorType, UpdateTier, all_factories};
use anyhow::Result;
use prometheus::Registry;

/// The set of collector instances the manager drives.
///
/// Built once at startup from the static factory table; `register` allows
/// manual additions after construction (tests, extensions). Registering the
/// same collector type more than once is allowed and yields independent
/// instances.
pub struct CollectorRegistry<C = CollectorType> {
    collectors: Vec<C>,
}

impl CollectorRegistry<CollectorType> {
    pub fn from_config(config: &CollectorConfig) -> Self {
        let factories = all_factories();
        let collectors = config
            .enabled_collectors
            .iter()
            .filter_map(|name| factories.get(name.as_str()).map(|f| f()))
            .collect();

        Self { collectors }
    }
}

impl<C: Collector> CollectorRegistry<C> {
    pub fn empty() -> Self {
        Self {
            collectors: Vec::new(),
        }
    }

    pub fn register(&mut self, collector: C) {
        self.collectors.push(collector);
    }

    pub fn collectors(&self) -> &[C] {
        &self.collectors
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    pub fn tier_count(&self, tier: UpdateTier) -> usize {
        self.collectors.iter().filter(|c| c.tier() == tier).count()
    }

    /// Register every collector's metric families. The first duplicate name
    /// aborts: that is a programming error, not a runtime condition.
    pub fn register_metrics(&self, registry: &Registry) -> Result<()> {
        for collector in &self.collectors {
            collector.register_metrics(registry)?;
        }
        Ok(())
    }
}
