//! Per-network client inventory with MAC and IP lookup indices.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientRecord {
    pub id: String,
    pub mac: String,
    pub ip: Option<String>,
    pub description: Option<String>,
    pub vlan: Option<i64>,
}

struct NetworkEntry {
    clients: HashMap<String, ClientRecord>,
    refreshed_at: Instant,
}

#[derive(Default)]
struct Indexed {
    networks: HashMap<String, NetworkEntry>,
    /// mac -> (network id, client id)
    by_mac: HashMap<String, (String, String)>,
    /// ip -> (network id, client id)
    by_ip: HashMap<String, (String, String)>,
}

impl Indexed {
    /// Drop one network and every index entry that points into it.
    fn remove_network(&mut self, network_id: &str) -> bool {
        let Some(entry) = self.networks.remove(network_id) else {
            return false;
        };
        for client in entry.clients.values() {
            if self
                .by_mac
                .get(&client.mac)
                .is_some_and(|(net, _)| net == network_id)
            {
                self.by_mac.remove(&client.mac);
            }
            if let Some(ip) = &client.ip
                && self.by_ip.get(ip).is_some_and(|(net, _)| net == network_id)
            {
                self.by_ip.remove(ip);
            }
        }
        true
    }
}

/// Client inventory keyed by network, refreshed wholesale per network.
///
/// A network that has not been refreshed within `ttl` is stale and gets
/// evicted by [`ClientStore::cleanup_stale`]. Secondary indices are rebuilt
/// as part of every mutation, never left behind.
pub struct ClientStore {
    ttl: Duration,
    inner: RwLock<Indexed>,
}

impl ClientStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(Indexed::default()),
        }
    }

    /// Replace a network's entire client set and stamp its refresh time.
    pub fn update_clients(&self, network_id: &str, clients: Vec<ClientRecord>) {
        let mut inner = self.inner.write();

        inner.remove_network(network_id);

        let mut map = HashMap::with_capacity(clients.len());
        for client in clients {
            inner
                .by_mac
                .insert(client.mac.clone(), (network_id.to_string(), client.id.clone()));
            if let Some(ip) = &client.ip {
                inner
                    .by_ip
                    .insert(ip.clone(), (network_id.to_string(), client.id.clone()));
            }
            map.insert(client.id.clone(), client);
        }

        inner.networks.insert(
            network_id.to_string(),
            NetworkEntry {
                clients: map,
                refreshed_at: Instant::now(),
            },
        );
    }

    pub fn lookup_by_mac(&self, mac: &str) -> Option<ClientRecord> {
        let inner = self.inner.read();
        let (network_id, client_id) = inner.by_mac.get(mac)?;
        inner
            .networks
            .get(network_id)?
            .clients
            .get(client_id)
            .cloned()
    }

    pub fn lookup_by_ip(&self, ip: &str) -> Option<ClientRecord> {
        let inner = self.inner.read();
        let (network_id, client_id) = inner.by_ip.get(ip)?;
        inner
            .networks
            .get(network_id)?
            .clients
            .get(client_id)
            .cloned()
    }

    pub fn network_clients(&self, network_id: &str) -> Vec<ClientRecord> {
        self.inner
            .read()
            .networks
            .get(network_id)
            .map(|entry| entry.clients.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn client_count(&self, network_id: &str) -> usize {
        self.inner
            .read()
            .networks
            .get(network_id)
            .map_or(0, |entry| entry.clients.len())
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

    /// Evict every stale network; returns how many were removed.
    ///
    /// Candidates are snapshotted first and re-checked under the write lock,
    /// so a network refreshed while the sweep runs survives it.
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
            debug!(evicted, "evicted stale client networks");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn client(id: &str, mac: &str, ip: &str) -> ClientRecord {
        ClientRecord {
            id: id.to_string(),
            mac: mac.to_string(),
            ip: Some(ip.to_string()),
            description: None,
            vlan: Some(10),
        }
    }

    #[test]
    fn test_lookup_after_update() {
        let store = ClientStore::new(Duration::from_secs(300));
        store.update_clients("N1", vec![client("c1", "aa:bb:cc:00:00:01", "10.0.0.1")]);

        assert_eq!(
            store.lookup_by_mac("aa:bb:cc:00:00:01").unwrap().id,
            "c1"
        );
        assert_eq!(store.lookup_by_ip("10.0.0.1").unwrap().id, "c1");
        assert_eq!(store.client_count("N1"), 1);
    }

    #[test]
    fn test_refresh_moves_ip_index() {
        let store = ClientStore::new(Duration::from_secs(300));
        store.update_clients("N1", vec![client("c1", "aa:bb:cc:00:00:01", "10.0.0.1")]);
        store.update_clients("N1", vec![client("c1", "aa:bb:cc:00:00:01", "10.0.0.2")]);

        assert!(store.lookup_by_ip("10.0.0.1").is_none());
        assert_eq!(store.lookup_by_ip("10.0.0.2").unwrap().id, "c1");
        assert_eq!(store.network_clients("N1").len(), 1);
    }

    #[test]
    fn test_full_replace_drops_vanished_clients() {
        let store = ClientStore::new(Duration::from_secs(300));
        store.update_clients(
            "N1",
            vec![
                client("c1", "aa:bb:cc:00:00:01", "10.0.0.1"),
                client("c2", "aa:bb:cc:00:00:02", "10.0.0.2"),
            ],
        );
        store.update_clients("N1", vec![client("c2", "aa:bb:cc:00:00:02", "10.0.0.2")]);

        assert!(store.lookup_by_mac("aa:bb:cc:00:00:01").is_none());
        assert!(store.lookup_by_ip("10.0.0.1").is_none());
        assert_eq!(store.client_count("N1"), 1);
    }

    #[test]
    fn test_networks_are_independent() {
        let store = ClientStore::new(Duration::from_secs(300));
        store.update_clients("N1", vec![client("c1", "aa:bb:cc:00:00:01", "10.0.0.1")]);
        store.update_clients("N2", vec![client("c2", "aa:bb:cc:00:00:02", "10.0.1.1")]);

        store.update_clients("N1", vec![]);

        assert!(store.lookup_by_mac("aa:bb:cc:00:00:01").is_none());
        assert_eq!(store.lookup_by_mac("aa:bb:cc:00:00:02").unwrap().id, "c2");
        assert_eq!(store.tracked_networks(), 2);
    }

    #[test]
    fn test_staleness_and_cleanup() {
        let store = ClientStore::new(Duration::from_millis(30));
        store.update_clients("N1", vec![client("c1", "aa:bb:cc:00:00:01", "10.0.0.1")]);
        store.update_clients("N2", vec![client("c2", "aa:bb:cc:00:00:02", "10.0.1.1")]);

        assert!(!store.is_stale("N1"));
        sleep(Duration::from_millis(50));
        assert!(store.is_stale("N1"));

        // Refresh N2 right before the sweep: only N1 should go.
        store.update_clients("N2", vec![client("c2", "aa:bb:cc:00:00:02", "10.0.1.1")]);

        assert_eq!(store.cleanup_stale(), 1);
        assert_eq!(store.tracked_networks(), 1);
        assert!(store.lookup_by_mac("aa:bb:cc:00:00:01").is_none());
        assert!(store.lookup_by_mac("aa:bb:cc:00:00:02").is_some());

        // Nothing left to evict.
        assert_eq!(store.cleanup_stale(), 0);
    }

    #[test]
    fn test_unknown_network_is_not_stale() {
        let store = ClientStore::new(Duration::from_millis(10));
        assert!(!store.is_stale("nope"));
    }
}
