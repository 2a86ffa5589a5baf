use crate::api::DashboardApi;
use crate::collectors::{Collector, CollectorContext, UpdateTier, organizations_in_scope};
use crate::metrics::{set_gauge, set_int_gauge};
use crate::store::ClientRecord;
use anyhow::Result;
use prometheus::{Counter, GaugeVec, IntGauge, IntGaugeVec, Opts, Registry};
use tracing::{debug, info_span, instrument, warn};
use tracing_futures::Instrument as _;

/// Per-network client counts and usage, plus upkeep of the client store the
/// webhook and lookup paths read from.
///
/// Client listings are the highest-volume fetch in the exporter (one
/// paginated call per network), so per-network failures are classified and
/// skipped locally instead of failing the pass.
#[derive(Clone)]
pub struct ClientsCollector {
    clients_total: IntGaugeVec,  // dash_network_clients{network_id,network_name}
    usage_sent: GaugeVec,        // dash_network_client_usage_sent_kilobytes{network_id}
    usage_recv: GaugeVec,        // dash_network_client_usage_recv_kilobytes{network_id}
    store_networks: IntGauge,    // dash_client_store_networks
    store_evictions: Counter,    // dash_client_store_evictions_total
}

impl Default for ClientsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientsCollector {
    pub fn new() -> Self {
        let clients_total = IntGaugeVec::new(
            Opts::new("dash_network_clients", "Clients seen on the network recently"),
            &["network_id", "network_name"],
        )
        .expect("dash_network_clients");

        let usage_sent = GaugeVec::new(
            Opts::new(
                "dash_network_client_usage_sent_kilobytes",
                "Kilobytes sent by all clients over the lookback window",
            ),
            &["network_id"],
        )
        .expect("dash_network_client_usage_sent_kilobytes");

        let usage_recv = GaugeVec::new(
            Opts::new(
                "dash_network_client_usage_recv_kilobytes",
                "Kilobytes received by all clients over the lookback window",
            ),
            &["network_id"],
        )
        .expect("dash_network_client_usage_recv_kilobytes");

        let store_networks = IntGauge::with_opts(Opts::new(
            "dash_client_store_networks",
            "Networks currently tracked by the client store",
        ))
        .expect("dash_client_store_networks");

        let store_evictions = Counter::with_opts(Opts::new(
            "dash_client_store_evictions_total",
            "Client store networks evicted for staleness",
        ))
        .expect("dash_client_store_evictions_total");

        Self {
            clients_total,
            usage_sent,
            usage_recv,
            store_networks,
            store_evictions,
        }
    }
}

impl Collector for ClientsCollector {
    fn name(&self) -> &'static str {
        "clients"
    }

    fn tier(&self) -> UpdateTier {
        UpdateTier::Medium
    }

    fn enabled_by_default(&self) -> bool {
        true
    }

    #[instrument(skip(self, registry), level = "info", err, fields(collector = "clients"))]
    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.clients_total.clone()))?;
        registry.register(Box::new(self.usage_sent.clone()))?;
        registry.register(Box::new(self.usage_recv.clone()))?;
        registry.register(Box::new(self.store_networks.clone()))?;
        registry.register(Box::new(self.store_evictions.clone()))?;
        Ok(())
    }

    fn collect(
        &self,
        api: &DashboardApi,
        ctx: &CollectorContext,
    ) -> impl std::future::Future<Output = Result<()>> + Send {
        let span = info_span!("collector.pass", collector = "clients", otel.kind = "internal");
        Box::pin(
            async move {
                let organizations = organizations_in_scope(api, ctx).await?;

                self.clients_total.reset();
                self.usage_sent.reset();
                self.usage_recv.reset();

                for org in &organizations {
                    let networks = match api.networks(&org.id).await {
                        Ok(networks) => networks,
                        Err(err) if err.is_not_available() => {
                            debug!(org = %org.id, "network listing not available");
                            continue;
                        }
                        Err(err) => {
                            warn!(org = %org.id, error = %err, "failed to fetch networks");
                            ctx.stats.record_fetch_error(self.name(), err.kind());
                            continue;
                        }
                    };

                    for network in &networks {
                        let clients = match api.network_clients(&network.id).await {
                            Ok(clients) => clients,
                            Err(err) if err.is_not_available() => {
                                // Some product types have no client listing.
                                debug!(network = %network.id, "client listing not available");
                                continue;
                            }
                            Err(err) => {
                                warn!(network = %network.id, error = %err, "failed to fetch clients");
                                ctx.stats.record_fetch_error(self.name(), err.kind());
                                continue;
                            }
                        };

                        let mut sent = 0.0;
                        let mut recv = 0.0;
                        let records: Vec<ClientRecord> = clients
                            .iter()
                            .map(|client| {
                                if let Some(usage) = &client.usage {
                                    sent += usage.sent.unwrap_or(0.0);
                                    recv += usage.recv.unwrap_or(0.0);
                                }
                                ClientRecord {
                                    id: client.id.clone(),
                                    mac: client.mac.clone(),
                                    ip: client.ip.clone(),
                                    description: client.description.clone(),
                                    vlan: client.vlan,
                                }
                            })
                            .collect();

                        set_int_gauge(
                            &self.clients_total,
                            &[&network.id, &network.name],
                            records.len() as i64,
                        )?;
                        set_gauge(&self.usage_sent, &[&network.id], sent)?;
                        set_gauge(&self.usage_recv, &[&network.id], recv)?;

                        ctx.clients.update_clients(&network.id, records);
                    }
                }

                let evicted = ctx.clients.cleanup_stale();
                if evicted > 0 {
                    self.store_evictions.inc_by(evicted as f64);
                }
                self.store_networks.set(ctx.clients.tracked_networks() as i64);

                Ok(())
            }
            .instrument(span),
        )
    }
}
