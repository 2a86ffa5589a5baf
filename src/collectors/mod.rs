use crate::api::DashboardApi;
use crate::api::types::Organization;
use crate::metrics::retain::RetainingValueCache;
use crate::store::{ClientStore, DeviceDirectory};
use anyhow::Result;
use prometheus::Registry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[macro_use]
mod register_macro;

/// Collection cadence. Fast covers volatile state (statuses, uplinks),
/// medium covers inventory, slow covers organization-level data that barely
/// moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateTier {
    Fast,
    Medium,
    Slow,
}

impl UpdateTier {
    pub const ALL: [Self; 3] = [Self::Fast, Self::Medium, Self::Slow];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
        }
    }
}

impl fmt::Display for UpdateTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared state handed to every collector invocation.
#[derive(Clone)]
pub struct CollectorContext {
    pub retained: Arc<RetainingValueCache>,
    pub clients: Arc<ClientStore>,
    pub directory: Arc<DeviceDirectory>,
    pub stats: Arc<runstats::RunStats>,
    /// Organization ids to collect; empty means every organization the API
    /// key can see.
    pub organizations: Arc<[String]>,
}

impl CollectorContext {
    pub fn keeps_organization(&self, id: &str) -> bool {
        self.organizations.is_empty() || self.organizations.iter().any(|o| o == id)
    }
}

pub trait Collector {
    fn name(&self) -> &'static str;

    fn tier(&self) -> UpdateTier;

    fn enabled_by_default(&self) -> bool;

    /// Called exactly once at startup. A duplicate metric name here is a
    /// programming error and must bubble up before the exporter serves.
    fn register_metrics(&self, registry: &Registry) -> Result<()>;

    /// One full collection pass. Expected per-resource failures are handled
    /// internally; an `Err` means the pass produced nothing useful and is
    /// counted against this collector's health by the manager.
    fn collect(
        &self,
        api: &DashboardApi,
        ctx: &CollectorContext,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Fetch the organization list and apply the configured include filter.
///
/// Collectors call this first: if it fails there is no useful partial work,
/// so they abort the pass and let the manager classify the error.
pub(crate) async fn organizations_in_scope(
    api: &DashboardApi,
    ctx: &CollectorContext,
) -> Result<Vec<Organization>> {
    let organizations = api.organizations().await?;
    Ok(organizations
        .into_iter()
        .filter(|org| ctx.keeps_organization(&org.id))
        .collect())
}

// THIS IS THE ONLY PLACE YOU NEED TO ADD NEW COLLECTORS ✨
register_collectors! {
    devices => DevicesCollector,
    uplinks => UplinksCollector,
    networks => NetworksCollector,
    clients => ClientsCollector,
    organization => OrganizationCollector,
}

// Other modules
pub mod config;
pub mod registry;
pub mod runstats;
pub mod scheduler;
