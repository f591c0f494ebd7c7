//! Listener configuration for the node binary.

use serde::Deserialize;

/// Server binding settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    /// Host address to bind to.
    pub host: String,
    /// Port of the HTTP adapter and control plane.
    pub http_port: u16,
    /// Port of the gRPC adapter.
    pub grpc_port: u16,
}
