//! Mesh node settings.

use secrecy::SecretString;
use serde::Deserialize;

use crate::mesh::MatchMode;
use crate::transport::TransportKind;

/// Identity, peers and protocol of the local node.
#[derive(Debug, Deserialize, Clone)]
pub struct MeshSettings {
    /// Human-assigned label of this node.
    #[serde(default)]
    pub name: String,
    /// Advertised address. Derived from the server section when unset.
    pub address: Option<String>,
    /// Seed addresses probed while no peer is known.
    #[serde(default)]
    pub seeds: Vec<String>,
    /// Shared authentication secret.
    pub secret: SecretString,
    /// Wire transport to activate.
    #[serde(default)]
    pub transport: TransportKind,
    /// Seconds between discovery scans.
    pub scan_interval_secs: u64,
    /// Interpretation of routing patterns.
    #[serde(default)]
    pub match_mode: MatchMode,
}
