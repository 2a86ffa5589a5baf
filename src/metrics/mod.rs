//! Central metric state.
//!
//! [`MetricStore`] owns the process-wide `prometheus::Registry`. It is built
//! explicitly at startup and passed around — never a global — so tests can
//! create as many independent stores as they like. Collectors register their
//! families here once; the HTTP export path reads the same registry
//! concurrently (per-sample atomics, no exporter-level locking).

use anyhow::Result;
use prometheus::{
    CounterVec, GaugeVec, HistogramOpts, HistogramVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use serde::Serialize;

pub mod retain;

/// One exported series: family name, label pairs, current value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct FamilyCardinality {
    pub name: String,
    pub series: usize,
}

#[derive(Debug, Serialize)]
pub struct CardinalityReport {
    pub total_series: usize,
    pub families: Vec<FamilyCardinality>,
}

pub struct MetricStore {
    registry: Registry,
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricStore {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Create and register a labeled gauge family.
    ///
    /// A second registration under the same name returns an error; callers
    /// treat that as a fatal configuration problem at startup, never as a
    /// runtime condition to recover from.
    pub fn gauge_vec(&self, name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec> {
        let vec = GaugeVec::new(Opts::new(name, help), labels)?;
        self.registry.register(Box::new(vec.clone()))?;
        Ok(vec)
    }

    pub fn int_gauge_vec(&self, name: &str, help: &str, labels: &[&str]) -> Result<IntGaugeVec> {
        let vec = IntGaugeVec::new(Opts::new(name, help), labels)?;
        self.registry.register(Box::new(vec.clone()))?;
        Ok(vec)
    }

    pub fn counter_vec(&self, name: &str, help: &str, labels: &[&str]) -> Result<CounterVec> {
        let vec = CounterVec::new(Opts::new(name, help), labels)?;
        self.registry.register(Box::new(vec.clone()))?;
        Ok(vec)
    }

    pub fn histogram_vec(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
        buckets: Vec<f64>,
    ) -> Result<HistogramVec> {
        let vec = HistogramVec::new(HistogramOpts::new(name, help).buckets(buckets), labels)?;
        self.registry.register(Box::new(vec.clone()))?;
        Ok(vec)
    }

    /// Text exposition of everything currently registered.
    pub fn encode(&self) -> Result<String> {
        let mut buf = String::new();
        TextEncoder::new().encode_utf8(&self.registry.gather(), &mut buf)?;
        Ok(buf)
    }

    /// Point-in-time view of every series as (name, labels, value), derived
    /// from the same encoding the scrape path uses.
    ///
    /// Families are gathered one at a time, so concurrent writers may land
    /// between families — acceptable, last write wins per sample and a key
    /// never appears twice.
    pub fn snapshot(&self) -> Vec<Sample> {
        let Ok(text) = self.encode() else {
            return Vec::new();
        };
        text.lines().filter_map(parse_sample).collect()
    }

    /// Per-family series counts, for the cardinality introspection endpoint.
    pub fn cardinality(&self) -> CardinalityReport {
        let families: Vec<FamilyCardinality> = self
            .registry
            .gather()
            .iter()
            .map(|family| FamilyCardinality {
                name: family.name().to_string(),
                series: family.get_metric().len(),
            })
            .collect();

        CardinalityReport {
            total_series: families.iter().map(|f| f.series).sum(),
            families,
        }
    }
}

/// Checked upsert on a gauge family.
///
/// `labels` must match the declared label set in length and order; a mismatch
/// is a contract violation surfaced as an error rather than a panic.
pub fn set_gauge(vec: &GaugeVec, labels: &[&str], value: f64) -> Result<()> {
    vec.get_metric_with_label_values(labels)?.set(value);
    Ok(())
}

pub fn set_int_gauge(vec: &IntGaugeVec, labels: &[&str], value: i64) -> Result<()> {
    vec.get_metric_with_label_values(labels)?.set(value);
    Ok(())
}

pub fn inc_counter(vec: &CounterVec, labels: &[&str]) -> Result<()> {
    vec.get_metric_with_label_values(labels)?.inc();
    Ok(())
}

/// Parse one exposition line: `name{l1="v1",l2="v2"} value` or `name value`.
fn parse_sample(line: &str) -> Option<Sample> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (series, value) = line.rsplit_once(' ')?;
    let value: f64 = value.parse().ok()?;

    match series.split_once('{') {
        Some((name, rest)) => {
            let raw = rest.strip_suffix('}')?;
            Some(Sample {
                name: name.to_string(),
                labels: parse_labels(raw)?,
                value,
            })
        }
        None => Some(Sample {
            name: series.to_string(),
            labels: Vec::new(),
            value,
        }),
    }
}

/// Label values may contain escaped quotes, backslashes and newlines.
fn parse_labels(raw: &str) -> Option<Vec<(String, String)>> {
    let mut labels = Vec::new();
    let mut rest = raw;

    while !rest.is_empty() {
        let eq = rest.find("=\"")?;
        let name = rest[..eq].trim_start_matches(',').to_string();

        let mut value = String::new();
        let mut closing = None;
        let mut escaped = false;
        for (i, c) in rest[eq + 2..].char_indices() {
            if escaped {
                value.push(match c {
                    'n' => '\n',
                    other => other,
                });
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                closing = Some(i);
                break;
            } else {
                value.push(c);
            }
        }

        labels.push((name, value));
        rest = &rest[eq + 2 + closing? + 1..];
    }

    Some(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_registration_is_an_error() {
        let store = MetricStore::new();
        store
            .gauge_vec("dash_test_gauge", "first", &["id"])
            .unwrap();

        let second = store.gauge_vec("dash_test_gauge", "second", &["id"]);
        assert!(second.is_err());
    }

    #[test]
    fn test_set_gauge_rejects_wrong_cardinality() {
        let store = MetricStore::new();
        let vec = store
            .gauge_vec("dash_test_gauge", "help", &["a", "b"])
            .unwrap();

        assert!(set_gauge(&vec, &["only-one"], 1.0).is_err());
        assert!(set_gauge(&vec, &["one", "two", "three"], 1.0).is_err());
        assert!(set_gauge(&vec, &["one", "two"], 1.0).is_ok());
    }

    #[test]
    fn test_snapshot_last_write_wins_no_duplicates() {
        let store = MetricStore::new();
        let vec = store.gauge_vec("dash_test_gauge", "help", &["id"]).unwrap();

        set_gauge(&vec, &["x"], 1.0).unwrap();
        set_gauge(&vec, &["x"], 42.0).unwrap();
        set_gauge(&vec, &["y"], 7.0).unwrap();

        let snapshot = store.snapshot();
        let x_samples: Vec<&Sample> = snapshot
            .iter()
            .filter(|s| s.labels.contains(&("id".to_string(), "x".to_string())))
            .collect();

        assert_eq!(x_samples.len(), 1);
        assert_eq!(x_samples[0].value, 42.0);
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_encode_produces_exposition_format() {
        let store = MetricStore::new();
        let vec = store
            .gauge_vec("dash_test_gauge", "a test gauge", &["id"])
            .unwrap();
        set_gauge(&vec, &["x"], 3.0).unwrap();

        let text = store.encode().unwrap();
        assert!(text.contains("# HELP dash_test_gauge a test gauge"));
        assert!(text.contains("# TYPE dash_test_gauge gauge"));
        assert!(text.contains("dash_test_gauge{id=\"x\"} 3"));
    }

    #[test]
    fn test_parse_sample_with_escaped_label_values() {
        let sample = parse_sample(r#"dash_test{name="lobby \"main\" ap",id="x"} 2.5"#).unwrap();
        assert_eq!(sample.name, "dash_test");
        assert_eq!(
            sample.labels,
            vec![
                ("name".to_string(), "lobby \"main\" ap".to_string()),
                ("id".to_string(), "x".to_string())
            ]
        );
        assert_eq!(sample.value, 2.5);
    }

    #[test]
    fn test_parse_sample_skips_comments_and_garbage() {
        assert!(parse_sample("# HELP dash_test help text").is_none());
        assert!(parse_sample("").is_none());
        assert!(parse_sample("dash_test not-a-number").is_none());
        assert!(parse_sample("dash_test 4").is_some());
    }

    #[test]
    fn test_cardinality_counts_series_per_family() {
        let store = MetricStore::new();
        let a = store.gauge_vec("dash_family_a", "a", &["id"]).unwrap();
        let b = store.gauge_vec("dash_family_b", "b", &["id"]).unwrap();

        set_gauge(&a, &["1"], 1.0).unwrap();
        set_gauge(&a, &["2"], 1.0).unwrap();
        set_gauge(&b, &["1"], 1.0).unwrap();

        let report = store.cardinality();
        assert_eq!(report.total_series, 3);

        let family_a = report
            .families
            .iter()
            .find(|f| f.name == "dash_family_a")
            .unwrap();
        assert_eq!(family_a.series, 2);
    }
}
