//! Discovered device identities, used to put human names on serials.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub serial: String,
    pub name: Option<String>,
    pub model: Option<String>,
    pub network_id: String,
}

struct NetworkDevices {
    devices: HashMap<String, DeviceRecord>,
    refreshed_at: Instant,
}

#[derive(Default)]
struct Directory {
    networks: HashMap<String, NetworkDevices>,
    /// serial -> network id
    by_serial: HashMap<String, String>,
}

impl Directory {
    fn remove_network(&mut self, network_id: &str) -> bool {
        let Some(entry) = self.networks.remove(network_id) else {
            return false;
        };
        for serial in entry.devices.keys() {
            if self
                .by_serial
                .get(serial)
                .is_some_and(|net| net == network_id)
            {
                self.by_serial.remove(serial);
            }
        }
        true
    }
}

/// Serial → device lookup refreshed by the networks collector, read by the
/// fast-tier collectors for label enrichment.
pub struct DeviceDirectory {
    ttl: Duration,
    inner: RwLock<Directory>,
}

impl DeviceDirectory {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(Directory::default()),
        }
    }

    /// Replace one network's device set.
    pub fn update_network(&self, network_id: &str, devices: Vec<DeviceRecord>) {
        let mut inner = self.inner.write();

        inner.remove_network(network_id);

        let mut map = HashMap::with_capacity(devices.len());
        for device in devices {
            inner
                .by_serial
                .insert(device.serial.clone(), network_id.to_string());
            map.insert(device.serial.clone(), device);
        }

        inner.networks.insert(
            network_id.to_string(),
            NetworkDevices {
                devices: map,
                refreshed_at: Instant::now(),
            },
        );
    }

    pub fn lookup(&self, serial: &str) -> Option<DeviceRecord> {
        let inner = self.inner.read();
        let network_id = inner.by_serial.get(serial)?;
        inner.networks.get(network_id)?.devices.get(serial).cloned()
    }

    /// Device name if discovered, else the serial itself.
    pub fn display_name(&self, serial: &str) -> String {
        self.lookup(serial)
            .and_then(|d| d.name)
            .unwrap_or_else(|| serial.to_string())
    }

    pub fn device_count(&self) -> usize {
        self.inner
            .read()
            .networks
            .values()
            .map(|n| n.devices.len())
            .sum()
    }

    pub fn tracked_networks(&self) -> usize {
        self.inner.read().networks.len()
    }

    pub fn is_stale(&self, network_id: &str) -> bool {
        self.inner
            .read()
            .networks
            .get(network_id)
            .is_some_and(|entry| entry.refreshed_at.elapsed() > self.ttl)
    }

    /// Same evict-by-snapshot sweep as the client store.
    pub fn cleanup_stale(&self) -> usize {
        let candidates: Vec<String> = {
            let inner = self.inner.read();
            inner
                .networks
                .iter()
                .filter(|(_, entry)| entry.refreshed_at.elapsed() > self.ttl)
                .map(|(id, _)| id.clone())
                .collect()
        };

        if candidates.is_empty() {
            return 0;
        }

        let mut inner = self.inner.write();
        let mut evicted = 0;
        for network_id in candidates {
            let still_stale = inner
                .networks
                .get(&network_id)
                .is_some_and(|entry| entry.refreshed_at.elapsed() > self.ttl);
            if still_stale && inner.remove_network(&network_id) {
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(evicted, "evicted stale directory networks");
        }
        evicted
    }
}
