//! Configuration management for the node binary.
//!
//! Values are layered: built-in defaults, then an optional `weave.toml` in
//! the working directory, then `WEAVE__`-prefixed environment variables
//! (`WEAVE__MESH__SEEDS` takes a comma-separated list). The mesh engine never
//! reads these sources itself; it only receives the [`MeshOptions`] derived
//! from them.
//!
//! # Example
//!
//! ```no_run
//! use weave_node::infrastructure::config::Settings;
//!
//! let settings = Settings::new().expect("Failed to load configuration");
//! let options = settings.mesh_options().expect("Invalid mesh settings");
//! ```

pub mod mesh;
pub mod server;
pub mod telemetry;

pub use mesh::MeshSettings;
pub use server::ServerSettings;
pub use telemetry::TelemetrySettings;

use anyhow::Context;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::mesh::{MeshOptions, PeerAddress};
use crate::transport::TransportKind;

/// Name of the optional configuration file.
pub const CONFIG_FILE: &str = "weave.toml";

/// Top-level configuration for a node.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Server settings.
    pub server: ServerSettings,
    /// Mesh node settings.
    pub mesh: MeshSettings,
    /// Telemetry settings.
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Loads settings from defaults, `weave.toml` and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be built or deserialized.
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(Path::new(CONFIG_FILE))
    }

    /// Loads settings using `file` as the optional configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be built or deserialized.
    pub fn load(file: &Path) -> Result<Self, ConfigError> {
        let s = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.http_port", 3000)?
            .set_default("server.grpc_port", 50051)?
            .set_default("mesh.secret", "")?
            .set_default("mesh.scan_interval_secs", 5)?
            .set_default("telemetry.service_name", "weave")?
            .set_default("telemetry.log_level", "info")?
            .set_default("telemetry.sampling_ratio", 1.0)?
            .add_source(File::from(file).required(false))
            // Merge in Environment variables
            .add_source(
                Environment::with_prefix("WEAVE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("mesh.seeds")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Converts the mesh section into engine options.
    ///
    /// Without an explicit address the node advertises
    /// `http://{host}:{port}`, using the port of the active transport.
    ///
    /// # Errors
    ///
    /// Returns an error if an address or seed is malformed.
    pub fn mesh_options(&self) -> anyhow::Result<MeshOptions> {
        let address = match &self.mesh.address {
            Some(address) => PeerAddress::new(address)
                .with_context(|| format!("Invalid mesh address '{address}'"))?,
            None => {
                let port = match self.mesh.transport {
                    TransportKind::Http => self.server.http_port,
                    TransportKind::Grpc => self.server.grpc_port,
                };
                PeerAddress::new(&format!("http://{}:{port}", self.server.host))?
            }
        };

        let seeds = self
            .mesh
            .seeds
            .iter()
            .filter(|seed| !seed.trim().is_empty())
            .map(|seed| PeerAddress::new(seed).with_context(|| format!("Invalid seed '{seed}'")))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(MeshOptions::builder()
            .name(self.mesh.name.clone())
            .address(address)
            .seeds(seeds)
            .secret(self.mesh.secret.clone())
            .transport(self.mesh.transport)
            .scan_interval(Duration::from_secs(self.mesh.scan_interval_secs))
            .match_mode(self.mesh.match_mode)
            .build()?)
    }
}

/// Helper for strong typing addresses
pub struct BindAddress(pub String, pub u16);

impl BindAddress {
    /// Converts the bind address to a `SocketAddr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the IP address string cannot be parsed.
    pub fn to_socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        let ip = self
            .0
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid IP address '{}': {e}", self.0))?;
        Ok(std::net::SocketAddr::new(ip, self.1))
    }
}
