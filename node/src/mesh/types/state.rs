//! Mesh snapshot exchanged between nodes and pushed to observers.

use serde::{Deserialize, Serialize};

use super::peer::Peer;

/// A point-in-time view of the mesh as seen by one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshState {
    /// The node that produced this snapshot.
    pub current: Peer,
    /// Peers the node currently believes reachable. Never contains `current`.
    #[serde(default)]
    pub peers: Vec<Peer>,
}

impl MeshState {
    /// Builds a snapshot, dropping any entry that shares the current peer's ID.
    #[must_use]
    pub fn new(current: Peer, peers: Vec<Peer>) -> Self {
        let peers = peers
            .into_iter()
            .filter(|p| p.id() != current.id())
            .collect();
        Self { current, peers }
    }

    /// Returns the current peer followed by every known peer.
    pub fn all(&self) -> impl Iterator<Item = &Peer> {
        std::iter::once(&self.current).chain(self.peers.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::types::PeerAddress;

    fn peer(name: &str) -> Peer {
        Peer::new(name, PeerAddress::new(&format!("http://{name}:80")).unwrap())
    }

    #[test]
    fn new_excludes_current_from_peers() {
        let current = peer("self");
        let other = peer("other");

        let state = MeshState::new(current.clone(), vec![current.clone(), other.clone()]);

        assert_eq!(state.peers, vec![other]);
        assert_eq!(state.all().count(), 2);
    }

    #[test]
    fn missing_peers_field_deserializes_as_empty() {
        let current = peer("self");
        let json = serde_json::json!({ "current": current });

        let state: MeshState = serde_json::from_value(json).unwrap();
        assert!(state.peers.is_empty());
    }
}
