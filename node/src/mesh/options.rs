//! Construction options for a mesh engine.

use secrecy::SecretString;
use std::time::Duration;

use crate::mesh::pattern::MatchMode;
use crate::mesh::types::{PeerAddress, ValidationError};
use crate::transport::TransportKind;

/// Interval between discovery scans.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Plain configuration values for one node.
#[derive(Debug, Clone)]
pub struct MeshOptions {
    /// Human-assigned label of this node.
    pub name: String,
    /// Address other nodes use to reach this node.
    pub address: PeerAddress,
    /// Addresses probed while the registry is empty.
    pub seeds: Vec<PeerAddress>,
    /// Shared authentication secret.
    pub secret: SecretString,
    /// Wire transport to activate.
    pub transport: TransportKind,
    /// Sleep between discovery scans.
    pub scan_interval: Duration,
    /// Interpretation of broadcast and request patterns.
    pub match_mode: MatchMode,
}

impl MeshOptions {
    /// Returns a builder for constructing `MeshOptions` with validation.
    #[must_use]
    pub fn builder() -> MeshOptionsBuilder {
        MeshOptionsBuilder::default()
    }
}

/// Builder for [`MeshOptions`].
#[derive(Debug, Default)]
pub struct MeshOptionsBuilder {
    name: Option<String>,
    address: Option<PeerAddress>,
    seeds: Vec<PeerAddress>,
    secret: Option<SecretString>,
    transport: TransportKind,
    scan_interval: Option<Duration>,
    match_mode: MatchMode,
}

impl MeshOptionsBuilder {
    /// Sets the node name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the advertised address.
    #[must_use]
    pub fn address(mut self, address: PeerAddress) -> Self {
        self.address = Some(address);
        self
    }

    /// Adds a seed address.
    #[must_use]
    pub fn seed(mut self, address: PeerAddress) -> Self {
        self.seeds.push(address);
        self
    }

    /// Sets all seed addresses.
    #[must_use]
    pub fn seeds(mut self, seeds: Vec<PeerAddress>) -> Self {
        self.seeds = seeds;
        self
    }

    /// Sets the shared secret.
    #[must_use]
    pub fn secret(mut self, secret: SecretString) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Selects the wire transport.
    #[must_use]
    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Overrides the scan interval.
    #[must_use]
    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = Some(interval);
        self
    }

    /// Selects how routing patterns are interpreted.
    #[must_use]
    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// Builds the options.
    ///
    /// # Errors
    /// Returns `ValidationError::EmptyAddress` if no address was set.
    pub fn build(self) -> Result<MeshOptions, ValidationError> {
        let address = self.address.ok_or(ValidationError::EmptyAddress)?;

        Ok(MeshOptions {
            name: self.name.unwrap_or_default(),
            address,
            seeds: self.seeds,
            secret: self.secret.unwrap_or_else(|| SecretString::new("".into())),
            transport: self.transport,
            scan_interval: self.scan_interval.unwrap_or(DEFAULT_SCAN_INTERVAL),
            match_mode: self.match_mode,
        })
    }
}
