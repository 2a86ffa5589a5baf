//! Satellite caches for inventory discovered from the dashboard API.
//!
//! These are not part of the metric pipeline: they hold derived state
//! (client records, device identities) that collectors consume for label
//! enrichment and lookups. Both follow the same pattern: full replace per
//! network on refresh, TTL-based staleness, bulk eviction by snapshot.

pub mod clients;
pub mod discovery;

pub use clients::{ClientRecord, ClientStore};
pub use discovery::{DeviceDirectory, DeviceRecord};
