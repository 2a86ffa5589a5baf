//! Tiered collection scheduler.
//!
//! One repeating timer per tier; each tick fans out concurrently over that
//! tier's collectors. Every invocation goes through the same wrapper —
//! overlap guard, timeout, duration measurement, error classification — so a
//! misbehaving collector can slow down or fail only itself, never its
//! siblings and never the next tick.

use crate::api::DashboardApi;
use crate::api::error::ErrorKind;
use crate::collectors::registry::CollectorRegistry;
use crate::collectors::{Collector, CollectorContext, CollectorType, UpdateTier};
use crate::collectors::config::TierIntervals;
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct SchedulerSettings {
    pub intervals: TierIntervals,
    /// Soft ceiling per collection pass; generous because a pass may walk
    /// many paginated listings.
    pub collector_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            intervals: TierIntervals::default(),
            collector_timeout: Duration::from_secs(120),
        }
    }
}

pub struct CollectorManager<C = CollectorType> {
    registry: CollectorRegistry<C>,
    api: Arc<DashboardApi>,
    ctx: CollectorContext,
    settings: SchedulerSettings,
    /// One overlap guard per collector instance, aligned with the registry.
    busy: Vec<AtomicBool>,
}

impl<C> CollectorManager<C>
where
    C: Collector + Send + Sync + 'static,
{
    pub fn new(
        registry: CollectorRegistry<C>,
        api: Arc<DashboardApi>,
        ctx: CollectorContext,
        settings: SchedulerSettings,
    ) -> Self {
        let busy = (0..registry.len()).map(|_| AtomicBool::new(false)).collect();
        Self {
            registry,
            api,
            ctx,
            settings,
            busy,
        }
    }

    pub fn collector_names(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    /// Start one timer task per tier. The first tick fires immediately so
    /// the exporter has data as soon as possible after startup.
    ///
    /// `MissedTickBehavior::Delay` gives fixed-rate best-effort semantics: a
    /// tick that overruns its interval delays the next one instead of
    /// stacking up behind it.
    pub fn spawn(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        UpdateTier::ALL
            .iter()
            .map(|&tier| {
                let manager = Arc::clone(self);
                let period = manager.settings.intervals.interval(tier);
                info!(
                    tier = tier.as_str(),
                    period_s = period.as_secs(),
                    collectors = manager.registry.tier_count(tier),
                    "starting tier"
                );
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticker.tick().await;
                        manager.run_tier(tier).await;
                    }
                })
            })
            .collect()
    }

    /// Run every collector of one tier concurrently and wait for all of them
    /// to reach a terminal state.
    pub async fn run_tier(&self, tier: UpdateTier) {
        let started = Instant::now();

        let runs = self
            .registry
            .collectors()
            .iter()
            .enumerate()
            .filter(|(_, collector)| collector.tier() == tier)
            .map(|(idx, collector)| self.run_collector(idx, collector));
        join_all(runs).await;

        let elapsed = started.elapsed();
        self.ctx.stats.record_tick(tier, elapsed);
        debug!(
            tier = tier.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "tick complete"
        );
    }

    /// The single composition point wrapping every collector invocation.
    async fn run_collector(&self, idx: usize, collector: &C) {
        let name = collector.name();

        // If the previous pass of this instance has not finished, skip this
        // tick entirely: never queue, never run a collector against itself.
        let Some(_running) = RunGuard::acquire(&self.busy[idx]) else {
            warn!(collector = name, "previous pass still running, skipping tick");
            self.ctx.stats.record_skip(name);
            return;
        };

        let tier = collector.tier();
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.settings.collector_timeout,
            collector.collect(&self.api, &self.ctx),
        )
        .await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(())) => {
                self.ctx.stats.record_success(name, tier, elapsed);
                debug!(
                    collector = name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "pass complete"
                );
            }
            Ok(Err(err)) => {
                let kind = ErrorKind::classify(&err);
                warn!(
                    collector = name,
                    error = %err,
                    category = kind.as_str(),
                    "collection pass failed"
                );
                self.ctx.stats.record_failure(name, tier, kind, elapsed);
            }
            Err(_) => {
                warn!(
                    collector = name,
                    timeout_s = self.settings.collector_timeout.as_secs(),
                    "collection pass timed out"
                );
                self.ctx
                    .stats
                    .record_failure(name, tier, ErrorKind::Timeout, elapsed);
            }
        }
    }
}

/// Clears the busy flag on drop, including when the pass is cancelled.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then_some(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
