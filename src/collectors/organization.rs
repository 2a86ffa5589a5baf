use crate::api::DashboardApi;
use crate::collectors::{Collector, CollectorContext, UpdateTier, organizations_in_scope};
use crate::metrics::{set_gauge, set_int_gauge};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use prometheus::{GaugeVec, IntGaugeVec, Opts, Registry};
use tracing::{debug, instrument, warn};

/// Organization identity and licensing. Licensing moves on the order of
/// days, hence the slow tier.
#[derive(Clone)]
pub struct OrganizationCollector {
    org_info: IntGaugeVec,           // dash_organization_info{organization_id,name}
    license_ok: IntGaugeVec,         // dash_organization_license_ok{organization_id}
    license_expiration: GaugeVec,    // dash_organization_license_expiration_seconds{organization_id}
    licensed_devices: IntGaugeVec,   // dash_organization_licensed_devices{organization_id,device_type}
}

impl Default for OrganizationCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl OrganizationCollector {
    pub fn new() -> Self {
        let org_info = IntGaugeVec::new(
            Opts::new("dash_organization_info", "Organization identity (always 1)"),
            &["organization_id", "name"],
        )
        .expect("dash_organization_info");

        let license_ok = IntGaugeVec::new(
            Opts::new(
                "dash_organization_license_ok",
                "Whether the organization's licensing status is OK",
            ),
            &["organization_id"],
        )
        .expect("dash_organization_license_ok");

        let license_expiration = GaugeVec::new(
            Opts::new(
                "dash_organization_license_expiration_seconds",
                "Seconds until the earliest license expiry (negative when past due)",
            ),
            &["organization_id"],
        )
        .expect("dash_organization_license_expiration_seconds");

        let licensed_devices = IntGaugeVec::new(
            Opts::new(
                "dash_organization_licensed_devices",
                "Licensed device counts by device type",
            ),
            &["organization_id", "device_type"],
        )
        .expect("dash_organization_licensed_devices");

        Self {
            org_info,
            license_ok,
            license_expiration,
            licensed_devices,
        }
    }
}

impl Collector for OrganizationCollector {
    fn name(&self) -> &'static str {
        "organization"
    }

    fn tier(&self) -> UpdateTier {
        UpdateTier::Slow
    }

    fn enabled_by_default(&self) -> bool {
        true
    }

    #[instrument(skip(self, registry), level = "info", err, fields(collector = "organization"))]
    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.org_info.clone()))?;
        registry.register(Box::new(self.license_ok.clone()))?;
        registry.register(Box::new(self.license_expiration.clone()))?;
        registry.register(Box::new(self.licensed_devices.clone()))?;
        Ok(())
    }

    fn collect(
        &self,
        api: &DashboardApi,
        ctx: &CollectorContext,
    ) -> impl std::future::Future<Output = Result<()>> + Send {
        Box::pin(async move {
            let organizations = organizations_in_scope(api, ctx).await?;

            self.org_info.reset();
            self.license_ok.reset();
            self.license_expiration.reset();
            self.licensed_devices.reset();

            let now = Utc::now();

            for org in &organizations {
                set_int_gauge(&self.org_info, &[&org.id, &org.name], 1)?;

                let overview = match api.license_overview(&org.id).await {
                    Ok(overview) => overview,
                    Err(err) if err.is_not_available() => {
                        // Per-device licensing models have no overview.
                        debug!(org = %org.id, "license overview not available");
                        continue;
                    }
                    Err(err) => {
                        warn!(org = %org.id, error = %err, "failed to fetch license overview");
                        ctx.stats.record_fetch_error(self.name(), err.kind());
                        continue;
                    }
                };

                let ok = i64::from(overview.status.as_deref() == Some("OK"));
                set_int_gauge(&self.license_ok, &[&org.id], ok)?;

                if let Some(raw) = &overview.expiration_date
                    && let Some(expires) = parse_expiration(raw)
                {
                    let remaining = (expires - now).num_seconds();
                    set_gauge(&self.license_expiration, &[&org.id], remaining as f64)?;
                }

                for (device_type, count) in &overview.licensed_device_counts {
                    set_int_gauge(&self.licensed_devices, &[&org.id, device_type], *count)?;
                }
            }

            Ok(())
        })
    }
}

/// The overview reports either a full RFC 3339 timestamp or a bare date.
fn parse_expiration(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
