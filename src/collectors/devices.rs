use crate::api::DashboardApi;
use crate::collectors::{Collector, CollectorContext, UpdateTier, organizations_in_scope};
use crate::metrics::{set_gauge, set_int_gauge};
use anyhow::Result;
use chrono::{DateTime, Utc};
use prometheus::{GaugeVec, IntGaugeVec, Opts, Registry};
use tracing::{debug, info_span, instrument, warn};
use tracing_futures::Instrument as _;

/// Exposes per-device reachability from the organization status listing:
/// - dash_device_up{serial,name,model,network_id} (1 = online)
/// - dash_device_status_info{serial,status}
/// - dash_device_last_reported_age_seconds{serial}
#[derive(Clone)]
pub struct DevicesCollector {
    device_up: IntGaugeVec,
    device_status: IntGaugeVec,
    last_reported_age: GaugeVec,
}

impl Default for DevicesCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DevicesCollector {
    pub fn new() -> Self {
        let device_up = IntGaugeVec::new(
            Opts::new("dash_device_up", "Whether the device is online (1) or not (0)"),
            &["serial", "name", "model", "network_id"],
        )
        .expect("dash_device_up");

        let device_status = IntGaugeVec::new(
            Opts::new(
                "dash_device_status_info",
                "Raw device status as reported by the dashboard",
            ),
            &["serial", "status"],
        )
        .expect("dash_device_status_info");

        let last_reported_age = GaugeVec::new(
            Opts::new(
                "dash_device_last_reported_age_seconds",
                "Seconds since the device last checked in",
            ),
            &["serial"],
        )
        .expect("dash_device_last_reported_age_seconds");

        Self {
            device_up,
            device_status,
            last_reported_age,
        }
    }
}

impl Collector for DevicesCollector {
    fn name(&self) -> &'static str {
        "devices"
    }

    fn tier(&self) -> UpdateTier {
        UpdateTier::Fast
    }

    fn enabled_by_default(&self) -> bool {
        true
    }

    #[instrument(skip(self, registry), level = "info", err, fields(collector = "devices"))]
    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.device_up.clone()))?;
        registry.register(Box::new(self.device_status.clone()))?;
        registry.register(Box::new(self.last_reported_age.clone()))?;
        Ok(())
    }

    fn collect(
        &self,
        api: &DashboardApi,
        ctx: &CollectorContext,
    ) -> impl std::future::Future<Output = Result<()>> + Send {
        let span = info_span!("collector.pass", collector = "devices", otel.kind = "internal");
        Box::pin(
            async move {
                // Nothing useful can happen without the organization list;
                // prior samples stay untouched when this fails.
                let organizations = organizations_in_scope(api, ctx).await?;

                // Clear stale series (removed devices, changed names) before
                // repopulating.
                self.device_up.reset();
                self.device_status.reset();
                self.last_reported_age.reset();

                let now = Utc::now();

                for org in &organizations {
                    let statuses = match api.device_statuses(&org.id).await {
                        Ok(statuses) => statuses,
                        Err(err) if err.is_not_available() => {
                            debug!(org = %org.id, "device statuses not available");
                            continue;
                        }
                        Err(err) => {
                            warn!(org = %org.id, error = %err, "failed to fetch device statuses");
                            ctx.stats.record_fetch_error(self.name(), err.kind());
                            continue;
                        }
                    };

                    for status in statuses {
                        let discovered = ctx.directory.lookup(&status.serial);
                        let name = status
                            .name
                            .clone()
                            .or_else(|| discovered.as_ref().and_then(|d| d.name.clone()))
                            .unwrap_or_else(|| status.serial.clone());
                        let model = discovered
                            .as_ref()
                            .and_then(|d| d.model.clone())
                            .unwrap_or_default();
                        let network = status.network_id.clone().unwrap_or_default();

                        let up = i64::from(status.status == "online");
                        set_int_gauge(
                            &self.device_up,
                            &[&status.serial, &name, &model, &network],
                            up,
                        )?;
                        set_int_gauge(&self.device_status, &[&status.serial, &status.status], 1)?;

                        if let Some(raw) = &status.last_reported_at
                            && let Ok(reported) = DateTime::parse_from_rfc3339(raw)
                        {
                            let age = (now - reported.with_timezone(&Utc)).num_seconds().max(0);
                            set_gauge(&self.last_reported_age, &[&status.serial], age as f64)?;
                        }
                    }
                }

                Ok(())
            }
            .instrument(span),
        )
    }
}
