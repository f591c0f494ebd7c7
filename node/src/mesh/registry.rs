//! Peer registry owned by one mesh engine.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::mesh::types::{Peer, PeerId};

/// Map from peer ID to peer record.
///
/// Reads take the shared lock and hand out copies; writes take the exclusive
/// lock for the map mutation only.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<PeerId, Peer>>,
}

impl PeerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the record for `peer.id()`, stamping `refreshed_at`.
    ///
    /// Returns true when the ID was not present before.
    pub fn upsert(&self, mut peer: Peer) -> bool {
        peer.refresh();
        let mut peers = self.peers.write();
        peers.insert(peer.id().clone(), peer).is_none()
    }

    /// Removes a peer. Returns the removed record, if any.
    pub fn remove(&self, id: &PeerId) -> Option<Peer> {
        self.peers.write().remove(id)
    }

    /// Returns a copy of one record.
    #[must_use]
    pub fn get(&self, id: &PeerId) -> Option<Peer> {
        self.peers.read().get(id).cloned()
    }

    /// Returns a copy of every record. Order is unspecified.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Peer> {
        self.peers.read().values().cloned().collect()
    }

    /// Number of registered peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Returns true if no peer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::types::PeerAddress;

    fn peer(name: &str, port: u16) -> Peer {
        Peer::new(
            name,
            PeerAddress::new(&format!("http://127.0.0.1:{port}")).unwrap(),
        )
    }

    #[test]
    fn test_registry_operations() {
        let registry = PeerRegistry::new();
        let p = peer("a", 1);
        let id = p.id().clone();

        assert!(registry.upsert(p));
        assert!(registry.get(&id).is_some());
        assert_eq!(registry.snapshot().len(), 1);

        assert!(registry.remove(&id).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn upsert_same_id_replaces_without_duplicate() {
        let registry = PeerRegistry::new();
        let mut p = peer("a", 1);
        registry.upsert(p.clone());
        let first_refresh = registry.get(p.id()).unwrap().refreshed_at();

        p.set_address(PeerAddress::new("http://127.0.0.1:2").unwrap());
        assert!(!registry.upsert(p.clone()));

        assert_eq!(registry.len(), 1);
        let stored = registry.get(p.id()).unwrap();
        assert_eq!(stored.address().as_str(), "http://127.0.0.1:2");
        assert!(stored.refreshed_at() >= first_refresh);
    }

    #[test]
    fn snapshot_is_detached_from_registry() {
        let registry = PeerRegistry::new();
        registry.upsert(peer("a", 1));

        let mut copy = registry.snapshot();
        copy.clear();

        assert_eq!(registry.len(), 1);
    }
}
