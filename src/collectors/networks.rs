use crate::api::DashboardApi;
use crate::collectors::{Collector, CollectorContext, UpdateTier, organizations_in_scope};
use crate::metrics::set_int_gauge;
use crate::store::DeviceRecord;
use anyhow::Result;
use prometheus::{Counter, IntGauge, IntGaugeVec, Opts, Registry};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Network and device inventory. Besides its own info gauges this collector
/// feeds the device directory the fast tier uses for name enrichment.
#[derive(Clone)]
pub struct NetworksCollector {
    network_info: IntGaugeVec,     // dash_network_info{network_id,name,organization_id}
    networks_total: IntGaugeVec,   // dash_networks_total{organization_id}
    device_info: IntGaugeVec,      // dash_device_info{serial,name,model,network_id,firmware}
    directory_devices: IntGauge,   // dash_discovery_devices
    directory_evictions: Counter,  // dash_discovery_evictions_total
}

impl Default for NetworksCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworksCollector {
    pub fn new() -> Self {
        let network_info = IntGaugeVec::new(
            Opts::new("dash_network_info", "Network identity (always 1)"),
            &["network_id", "name", "organization_id"],
        )
        .expect("dash_network_info");

        let networks_total = IntGaugeVec::new(
            Opts::new("dash_networks_total", "Number of networks per organization"),
            &["organization_id"],
        )
        .expect("dash_networks_total");

        let device_info = IntGaugeVec::new(
            Opts::new("dash_device_info", "Device identity (always 1)"),
            &["serial", "name", "model", "network_id", "firmware"],
        )
        .expect("dash_device_info");

        let directory_devices = IntGauge::with_opts(Opts::new(
            "dash_discovery_devices",
            "Devices currently held in the discovery directory",
        ))
        .expect("dash_discovery_devices");

        let directory_evictions = Counter::with_opts(Opts::new(
            "dash_discovery_evictions_total",
            "Directory networks evicted for staleness",
        ))
        .expect("dash_discovery_evictions_total");

        Self {
            network_info,
            networks_total,
            device_info,
            directory_devices,
            directory_evictions,
        }
    }
}

impl Collector for NetworksCollector {
    fn name(&self) -> &'static str {
        "networks"
    }

    fn tier(&self) -> UpdateTier {
        UpdateTier::Medium
    }

    fn enabled_by_default(&self) -> bool {
        true
    }

    #[instrument(skip(self, registry), level = "info", err, fields(collector = "networks"))]
    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.network_info.clone()))?;
        registry.register(Box::new(self.networks_total.clone()))?;
        registry.register(Box::new(self.device_info.clone()))?;
        registry.register(Box::new(self.directory_devices.clone()))?;
        registry.register(Box::new(self.directory_evictions.clone()))?;
        Ok(())
    }

    fn collect(
        &self,
        api: &DashboardApi,
        ctx: &CollectorContext,
    ) -> impl std::future::Future<Output = Result<()>> + Send {
        Box::pin(async move {
            let organizations = organizations_in_scope(api, ctx).await?;

            self.network_info.reset();
            self.networks_total.reset();
            self.device_info.reset();

            for org in &organizations {
                match api.networks(&org.id).await {
                    Ok(networks) => {
                        set_int_gauge(&self.networks_total, &[&org.id], networks.len() as i64)?;
                        for network in &networks {
                            set_int_gauge(
                                &self.network_info,
                                &[&network.id, &network.name, &org.id],
                                1,
                            )?;
                        }
                    }
                    Err(err) if err.is_not_available() => {
                        debug!(org = %org.id, "network listing not available");
                    }
                    Err(err) => {
                        warn!(org = %org.id, error = %err, "failed to fetch networks");
                        ctx.stats.record_fetch_error(self.name(), err.kind());
                    }
                }

                let devices = match api.devices(&org.id).await {
                    Ok(devices) => devices,
                    Err(err) if err.is_not_available() => {
                        debug!(org = %org.id, "device inventory not available");
                        continue;
                    }
                    Err(err) => {
                        warn!(org = %org.id, error = %err, "failed to fetch device inventory");
                        ctx.stats.record_fetch_error(self.name(), err.kind());
                        continue;
                    }
                };

                let mut per_network: HashMap<String, Vec<DeviceRecord>> = HashMap::new();

                for device in &devices {
                    let name = device.name.clone().unwrap_or_else(|| device.serial.clone());
                    let model = device.model.clone().unwrap_or_default();
                    let network = device.network_id.clone().unwrap_or_default();
                    let firmware = device.firmware.clone().unwrap_or_default();
                    set_int_gauge(
                        &self.device_info,
                        &[&device.serial, &name, &model, &network, &firmware],
                        1,
                    )?;

                    if let Some(network_id) = &device.network_id {
                        per_network
                            .entry(network_id.clone())
                            .or_default()
                            .push(DeviceRecord {
                                serial: device.serial.clone(),
                                name: device.name.clone(),
                                model: device.model.clone(),
                                network_id: network_id.clone(),
                            });
                    }
                }

                for (network_id, records) in per_network {
                    ctx.directory.update_network(&network_id, records);
                }
            }

            let evicted = ctx.directory.cleanup_stale();
            if evicted > 0 {
                self.directory_evictions.inc_by(evicted as f64);
            }
            self.directory_devices.set(ctx.directory.device_count() as i64);

            Ok(())
        })
    }
}
