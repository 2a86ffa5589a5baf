use crate::api::DashboardApi;
use crate::collectors::{Collector, CollectorContext, UpdateTier, organizations_in_scope};
use crate::metrics::retain::RetentionPolicy;
use crate::metrics::{set_gauge, set_int_gauge};
use anyhow::Result;
use prometheus::{GaugeVec, IntGaugeVec, Opts, Registry};
use tracing::{debug, instrument, warn};

/// Uplink reachability and link quality:
/// - dash_uplink_up{serial,interface,network_id} (1 = active)
/// - dash_uplink_status_info{serial,interface,status}
/// - dash_uplink_latency_ms{serial,uplink}
/// - dash_uplink_loss_percent{serial,uplink}
///
/// The probe endpoint intermittently reports null or zero latency for links
/// that are up, so latency keeps its last real value. Loss is the opposite:
/// zero loss is the healthy reading and must export as zero.
#[derive(Clone)]
pub struct UplinksCollector {
    uplink_up: IntGaugeVec,
    uplink_status: IntGaugeVec,
    latency_ms: GaugeVec,
    loss_percent: GaugeVec,
}

impl Default for UplinksCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl UplinksCollector {
    pub fn new() -> Self {
        let uplink_up = IntGaugeVec::new(
            Opts::new("dash_uplink_up", "Whether the uplink is active (1) or not (0)"),
            &["serial", "interface", "network_id"],
        )
        .expect("dash_uplink_up");

        let uplink_status = IntGaugeVec::new(
            Opts::new(
                "dash_uplink_status_info",
                "Raw uplink status as reported by the dashboard",
            ),
            &["serial", "interface", "status"],
        )
        .expect("dash_uplink_status_info");

        let latency_ms = GaugeVec::new(
            Opts::new(
                "dash_uplink_latency_ms",
                "Most recent uplink probe latency in milliseconds",
            ),
            &["serial", "uplink"],
        )
        .expect("dash_uplink_latency_ms");

        let loss_percent = GaugeVec::new(
            Opts::new(
                "dash_uplink_loss_percent",
                "Most recent uplink probe packet loss percentage",
            ),
            &["serial", "uplink"],
        )
        .expect("dash_uplink_loss_percent");

        Self {
            uplink_up,
            uplink_status,
            latency_ms,
            loss_percent,
        }
    }
}

impl Collector for UplinksCollector {
    fn name(&self) -> &'static str {
        "uplinks"
    }

    fn tier(&self) -> UpdateTier {
        UpdateTier::Fast
    }

    fn enabled_by_default(&self) -> bool {
        true
    }

    #[instrument(skip(self, registry), level = "info", err, fields(collector = "uplinks"))]
    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.uplink_up.clone()))?;
        registry.register(Box::new(self.uplink_status.clone()))?;
        registry.register(Box::new(self.latency_ms.clone()))?;
        registry.register(Box::new(self.loss_percent.clone()))?;
        Ok(())
    }

    fn collect(
        &self,
        api: &DashboardApi,
        ctx: &CollectorContext,
    ) -> impl std::future::Future<Output = Result<()>> + Send {
        Box::pin(async move {
            let organizations = organizations_in_scope(api, ctx).await?;

            // Status families are rebuilt every pass. The loss/latency
            // families are not reset: their series carry retained values
            // that must survive a pass where the probe data is absent.
            self.uplink_up.reset();
            self.uplink_status.reset();

            for org in &organizations {
                match api.uplink_statuses(&org.id).await {
                    Ok(statuses) => {
                        for status in statuses {
                            let network = status.network_id.clone().unwrap_or_default();
                            for uplink in &status.uplinks {
                                let up = i64::from(uplink.status == "active");
                                set_int_gauge(
                                    &self.uplink_up,
                                    &[&status.serial, &uplink.interface, &network],
                                    up,
                                )?;
                                set_int_gauge(
                                    &self.uplink_status,
                                    &[&status.serial, &uplink.interface, &uplink.status],
                                    1,
                                )?;
                            }
                        }
                    }
                    Err(err) if err.is_not_available() => {
                        debug!(org = %org.id, "uplink statuses not available");
                    }
                    Err(err) => {
                        warn!(org = %org.id, error = %err, "failed to fetch uplink statuses");
                        ctx.stats.record_fetch_error(self.name(), err.kind());
                    }
                }

                match api.uplink_loss_latency(&org.id).await {
                    Ok(series_set) => {
                        for series in series_set {
                            let latest = series.time_series.last();
                            let labels =
                                [("serial", series.serial.as_str()), ("uplink", series.uplink.as_str())];

                            let latency = ctx.retained.resolve(
                                "dash_uplink_latency_ms",
                                &labels,
                                latest.and_then(|p| p.latency_ms),
                                RetentionPolicy::RetainNonZero,
                            );
                            if let Some(value) = latency {
                                set_gauge(
                                    &self.latency_ms,
                                    &[&series.serial, &series.uplink],
                                    value,
                                )?;
                            }

                            let loss = ctx.retained.resolve(
                                "dash_uplink_loss_percent",
                                &labels,
                                latest.and_then(|p| p.loss_percent),
                                RetentionPolicy::ZeroAuthoritative,
                            );
                            if let Some(value) = loss {
                                set_gauge(
                                    &self.loss_percent,
                                    &[&series.serial, &series.uplink],
                                    value,
                                )?;
                            }
                        }
                    }
                    Err(err) if err.is_not_available() => {
                        debug!(org = %org.id, "uplink loss/latency not available");
                    }
                    Err(err) => {
                        warn!(org = %org.id, error = %err, "failed to fetch uplink loss/latency");
                        ctx.stats.record_fetch_error(self.name(), err.kind());
                    }
                }
            }

            Ok(())
        })
    }
}
