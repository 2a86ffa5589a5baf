use super::UpdateTier;
use anyhow::{Result, bail};
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;

/// Per-tier collection intervals.
///
/// Ordering fast ≤ medium ≤ slow is enforced here, at configuration time.
/// Medium being an integer multiple of fast keeps the tiers phase-aligned;
/// that one is only advisory.
#[derive(Clone, Debug)]
pub struct TierIntervals {
    fast: Duration,
    medium: Duration,
    slow: Duration,
}

impl TierIntervals {
    pub fn new(fast_secs: u64, medium_secs: u64, slow_secs: u64) -> Result<Self> {
        if fast_secs == 0 || medium_secs == 0 || slow_secs == 0 {
            bail!("tier intervals must be positive");
        }
        if fast_secs > medium_secs || medium_secs > slow_secs {
            bail!(
                "tier intervals must be ordered fast <= medium <= slow, got {fast_secs}s/{medium_secs}s/{slow_secs}s"
            );
        }
        if medium_secs % fast_secs != 0 {
            warn!(
                fast_secs,
                medium_secs, "medium interval is not a multiple of the fast interval"
            );
        }

        Ok(Self {
            fast: Duration::from_secs(fast_secs),
            medium: Duration::from_secs(medium_secs),
            slow: Duration::from_secs(slow_secs),
        })
    }

    pub fn interval(&self, tier: UpdateTier) -> Duration {
        match tier {
            UpdateTier::Fast => self.fast,
            UpdateTier::Medium => self.medium,
            UpdateTier::Slow => self.slow,
        }
    }
}

impl Default for TierIntervals {
    fn default() -> Self {
        Self {
            fast: Duration::from_secs(60),
            medium: Duration::from_secs(300),
            slow: Duration::from_secs(900),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CollectorConfig {
    pub enabled_collectors: HashSet<String>,
}

impl CollectorConfig {
    /// Create an empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable collectors by name
    pub fn with_enabled(mut self, collectors: &[String]) -> Self {
        self.enabled_collectors = collectors.iter().cloned().collect();
        self
    }

    /// Check if a collector is enabled
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled_collectors.contains(name)
    }
}
