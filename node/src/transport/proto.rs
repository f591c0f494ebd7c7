//! gRPC protocol definitions for the mesh transport.
//!
//! Contains the generated protobuf code for `mesh.MeshTransport` and the
//! conversions between wire messages and mesh types. Timestamps travel as
//! unix milliseconds.

#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::too_many_lines)]
tonic::include_proto!("mesh");

use chrono::{DateTime, Utc};

use crate::error::MeshError;
use crate::mesh::types as domain;

fn from_millis(ms: i64) -> Result<DateTime<Utc>, MeshError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| MeshError::Encoding(format!("timestamp {ms} out of range")))
}

impl From<&domain::Peer> for Peer {
    fn from(peer: &domain::Peer) -> Self {
        Self {
            id: peer.id().to_string(),
            name: peer.name().to_string(),
            address: peer.address().to_string(),
            created_at: peer.created_at().timestamp_millis(),
            updated_at: peer.updated_at().timestamp_millis(),
            refreshed_at: peer.refreshed_at().timestamp_millis(),
        }
    }
}

impl TryFrom<Peer> for domain::Peer {
    type Error = MeshError;

    fn try_from(peer: Peer) -> Result<Self, Self::Error> {
        let id = domain::PeerId::try_from_str(&peer.id)
            .map_err(|e| MeshError::Encoding(e.to_string()))?;
        let address = domain::PeerAddress::new(&peer.address)
            .map_err(|e| MeshError::Encoding(e.to_string()))?;
        Ok(domain::Peer::from_parts(
            id,
            peer.name,
            address,
            from_millis(peer.created_at)?,
            from_millis(peer.updated_at)?,
            from_millis(peer.refreshed_at)?,
        ))
    }
}

impl From<&domain::MeshState> for State {
    fn from(state: &domain::MeshState) -> Self {
        Self {
            current: Some(Peer::from(&state.current)),
            peers: state.peers.iter().map(Peer::from).collect(),
        }
    }
}

impl TryFrom<State> for domain::MeshState {
    type Error = MeshError;

    fn try_from(state: State) -> Result<Self, Self::Error> {
        let current = decode_peer(state.current)?;
        let peers = state
            .peers
            .into_iter()
            .map(domain::Peer::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(domain::MeshState::new(current, peers))
    }
}

/// Decodes an optional wire peer, treating absence as an encoding error.
pub fn decode_peer(peer: Option<Peer>) -> Result<domain::Peer, MeshError> {
    peer.ok_or_else(|| MeshError::Encoding("missing peer".to_string()))?
        .try_into()
}

/// Decodes an optional wire state, treating absence as an encoding error.
pub fn decode_state(state: Option<State>) -> Result<domain::MeshState, MeshError> {
    state
        .ok_or_else(|| MeshError::Encoding("missing state".to_string()))?
        .try_into()
}
