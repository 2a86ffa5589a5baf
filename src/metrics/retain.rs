//! Last-known-good value retention.
//!
//! Several vendor endpoints intermittently report zero or omit a reading for
//! a series that is actually unchanged (a probe that has not completed yet,
//! a page that arrived empty). Exporting that dip would look like a real
//! state change, so retention-eligible metrics keep their previous real value
//! instead. Loss/error-count style metrics declare zero authoritative and
//! bypass the cache entirely.
//!
//! Entries are never evicted: cardinality is bounded by the device and uplink
//! population, and a retained value is exactly as long-lived as the series it
//! backs.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Per-metric retention behavior, declared explicitly at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Zero and absent readings are polling artifacts; keep the last real
    /// (non-zero, non-absent) value.
    RetainNonZero,
    /// Zero is a legitimate reading ("loss" style counters); the cache is
    /// never consulted or updated.
    ZeroAuthoritative,
}

#[derive(Default)]
pub struct RetainingValueCache {
    values: Mutex<HashMap<String, f64>>,
}

impl RetainingValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide the value to export for one series.
    ///
    /// With [`RetentionPolicy::RetainNonZero`]: a real candidate (present and
    /// non-zero) is stored and returned; a zero or absent candidate returns
    /// the retained value if one exists, and otherwise passes through
    /// unchanged so a series that has never been real still exports honestly.
    ///
    /// With [`RetentionPolicy::ZeroAuthoritative`] the candidate is returned
    /// as-is.
    pub fn resolve(
        &self,
        metric: &str,
        labels: &[(&str, &str)],
        candidate: Option<f64>,
        policy: RetentionPolicy,
    ) -> Option<f64> {
        if policy == RetentionPolicy::ZeroAuthoritative {
            return candidate;
        }

        let key = cache_key(metric, labels);
        let mut values = self.values.lock();

        match candidate {
            Some(v) if v != 0.0 => {
                values.insert(key, v);
                Some(v)
            }
            _ => values.get(&key).copied().or(candidate),
        }
    }

    /// Number of retained series, exported for cardinality observability.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

/// Key is the metric name plus label values sorted by label name, so call
/// sites that list labels in different orders hit the same entry.
fn cache_key(metric: &str, labels: &[(&str, &str)]) -> String {
    let mut sorted: Vec<(&str, &str)> = labels.to_vec();
    sorted.sort_unstable_by_key(|(name, _)| *name);

    let mut key = String::with_capacity(metric.len() + sorted.len() * 16);
    key.push_str(metric);
    for (name, value) in sorted {
        key.push('\u{1f}');
        key.push_str(name);
        key.push('=');
        key.push_str(value);
    }
    key
}
