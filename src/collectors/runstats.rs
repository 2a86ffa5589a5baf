//! Per-collector operational health metrics.
//!
//! One instance is shared by the manager (run outcomes) and every collector
//! (per-resource fetch errors, API call accounting). All families live in the
//! same registry the domain metrics use, so a single scrape shows both the
//! data and the health of the pipeline producing it.

use crate::api::ApiCallRecorder;
use crate::api::error::ErrorKind;
use crate::collectors::UpdateTier;
use anyhow::Result;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Collection passes talk to a paginated remote API; buckets run into
/// minutes, not milliseconds.
const DURATION_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

#[derive(Clone)]
pub struct RunStats {
    duration_seconds: HistogramVec,      // {collector, tier}
    errors_total: CounterVec,            // {collector, error}
    last_success_timestamp: GaugeVec,    // {collector}
    skipped_ticks_total: CounterVec,     // {collector}
    tick_duration_seconds: HistogramVec, // {tier}
    api_requests_total: CounterVec,      // {call, outcome}
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        let duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dash_exporter_collector_duration_seconds",
                "Wall-clock time of one collection pass",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["collector", "tier"],
        )
        .expect("dash_exporter_collector_duration_seconds");

        let errors_total = CounterVec::new(
            Opts::new(
                "dash_exporter_collector_errors_total",
                "Collection failures by collector and error category",
            ),
            &["collector", "error"],
        )
        .expect("dash_exporter_collector_errors_total");

        let last_success_timestamp = GaugeVec::new(
            Opts::new(
                "dash_exporter_collector_last_success_timestamp_seconds",
                "Unix timestamp of the last fully successful pass per collector",
            ),
            &["collector"],
        )
        .expect("dash_exporter_collector_last_success_timestamp_seconds");

        let skipped_ticks_total = CounterVec::new(
            Opts::new(
                "dash_exporter_collector_skipped_ticks_total",
                "Ticks skipped because the previous pass was still running",
            ),
            &["collector"],
        )
        .expect("dash_exporter_collector_skipped_ticks_total");

        let tick_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dash_exporter_tick_duration_seconds",
                "Wall-clock time of one whole tier tick",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["tier"],
        )
        .expect("dash_exporter_tick_duration_seconds");

        let api_requests_total = CounterVec::new(
            Opts::new(
                "dash_exporter_api_requests_total",
                "Dashboard API requests by call and outcome",
            ),
            &["call", "outcome"],
        )
        .expect("dash_exporter_api_requests_total");

        Self {
            duration_seconds,
            errors_total,
            last_success_timestamp,
            skipped_ticks_total,
            tick_duration_seconds,
            api_requests_total,
        }
    }

    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.duration_seconds.clone()))?;
        registry.register(Box::new(self.errors_total.clone()))?;
        registry.register(Box::new(self.last_success_timestamp.clone()))?;
        registry.register(Box::new(self.skipped_ticks_total.clone()))?;
        registry.register(Box::new(self.tick_duration_seconds.clone()))?;
        registry.register(Box::new(self.api_requests_total.clone()))?;
        Ok(())
    }

    /// Handle the API client uses to count every outbound request.
    pub fn api_recorder(&self) -> ApiCallRecorder {
        ApiCallRecorder::new(self.api_requests_total.clone())
    }

    /// A pass reached its end without error: one duration observation, one
    /// last-success update.
    pub fn record_success(&self, collector: &str, tier: UpdateTier, elapsed: Duration) {
        self.duration_seconds
            .with_label_values(&[collector, tier.as_str()])
            .observe(elapsed.as_secs_f64());
        self.last_success_timestamp
            .with_label_values(&[collector])
            .set(unix_now());
    }

    /// A pass failed or timed out: one duration observation, one error
    /// increment in the classified category. Last-success stays untouched.
    pub fn record_failure(
        &self,
        collector: &str,
        tier: UpdateTier,
        kind: ErrorKind,
        elapsed: Duration,
    ) {
        self.duration_seconds
            .with_label_values(&[collector, tier.as_str()])
            .observe(elapsed.as_secs_f64());
        self.errors_total
            .with_label_values(&[collector, kind.as_str()])
            .inc();
    }

    /// A per-resource fetch inside an otherwise-continuing pass failed.
    pub fn record_fetch_error(&self, collector: &str, kind: ErrorKind) {
        self.errors_total
            .with_label_values(&[collector, kind.as_str()])
            .inc();
    }

    pub fn record_skip(&self, collector: &str) {
        self.skipped_ticks_total
            .with_label_values(&[collector])
            .inc();
    }

    pub fn record_tick(&self, tier: UpdateTier, elapsed: Duration) {
        self.tick_duration_seconds
            .with_label_values(&[tier.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    // Read-side accessors, used by the scheduler tests and nothing else hot.

    pub fn last_success(&self, collector: &str) -> f64 {
        self.last_success_timestamp
            .with_label_values(&[collector])
            .get()
    }

    pub fn error_count(&self, collector: &str, kind: ErrorKind) -> f64 {
        self.errors_total
            .with_label_values(&[collector, kind.as_str()])
            .get()
    }

    pub fn skip_count(&self, collector: &str) -> f64 {
        self.skipped_ticks_total
            .with_label_values(&[collector])
            .get()
    }

    pub fn run_count(&self, collector: &str, tier: UpdateTier) -> u64 {
        self.duration_seconds
            .with_label_values(&[collector, tier.as_str()])
            .get_sample_count()
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_without_error() {
        let stats = RunStats::new();
        let registry = Registry::new();
        assert!(stats.register(&registry).is_ok());
    }

    #[test]
    fn test_success_updates_last_success_and_duration() {
        let stats = RunStats::new();

        assert_eq!(stats.last_success("devices"), 0.0);
        stats.record_success("devices", UpdateTier::Fast, Duration::from_millis(120));

        assert!(stats.last_success("devices") > 0.0);
        assert_eq!(stats.run_count("devices", UpdateTier::Fast), 1);
    }

    #[test]
    fn test_failure_counts_category_but_not_success() {
        let stats = RunStats::new();

        stats.record_failure(
            "uplinks",
            UpdateTier::Fast,
            ErrorKind::ServerError,
            Duration::from_millis(50),
        );

        assert_eq!(stats.error_count("uplinks", ErrorKind::ServerError), 1.0);
        assert_eq!(stats.error_count("uplinks", ErrorKind::Timeout), 0.0);
        assert_eq!(stats.last_success("uplinks"), 0.0);
        assert_eq!(stats.run_count("uplinks", UpdateTier::Fast), 1);
    }

    #[test]
    fn test_fetch_errors_accumulate_without_duration() {
        let stats = RunStats::new();

        stats.record_fetch_error("clients", ErrorKind::RateLimit);
        stats.record_fetch_error("clients", ErrorKind::RateLimit);

        assert_eq!(stats.error_count("clients", ErrorKind::RateLimit), 2.0);
        assert_eq!(stats.run_count("clients", UpdateTier::Medium), 0);
    }

    #[test]
    fn test_api_recorder_feeds_shared_counter() {
        let stats = RunStats::new();
        let recorder = stats.api_recorder();

        recorder.record("organizations", "success");
        recorder.record("organizations", "rate_limit");

        assert_eq!(
            stats
                .api_requests_total
                .with_label_values(&["organizations", "success"])
                .get(),
            1.0
        );
    }
}
