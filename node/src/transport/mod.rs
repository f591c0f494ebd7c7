//! Pluggable wire transports.
//!
//! A [`Transport`] knows how to announce a peer to a remote node and how to
//! deliver one message to a remote peer. Two independent implementations are
//! provided and selected at construction time through [`TransportKind`]:
//!
//! - [`HttpTransport`]: one HTTP request per call, no state between calls.
//! - [`GrpcTransport`]: a long-lived gRPC channel per remote peer, opened by
//!   `connect`. `send` to a peer that was never connected fails with
//!   [`MeshError::NotConnected`] instead of dialing lazily.

pub mod grpc;
pub mod http;
pub mod proto;

pub use grpc::GrpcTransport;
pub use http::HttpTransport;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::MeshError;
use crate::mesh::types::{MeshState, Peer, PeerAddress};

/// Capability to reach other mesh nodes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Announces `from` to the node at `address` and returns that node's state.
    ///
    /// # Errors
    /// `Network`, `Unauthorized` or `Status` when the call fails, `Encoding`
    /// when the reply cannot be decoded.
    async fn connect(&self, from: &Peer, address: &PeerAddress) -> Result<MeshState, MeshError>;

    /// Delivers `subject` and `body` to `to`, authenticated as `from`, and
    /// returns the remote handler's reply body.
    ///
    /// # Errors
    /// `Network`, `Unauthorized` or `Status` when the call fails, `Remote`
    /// when the remote handler reported an error.
    async fn send(
        &self,
        from: &Peer,
        to: &Peer,
        subject: &str,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, MeshError>;
}

/// Which wire transport a node activates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// JSON over HTTP, one request per call.
    #[default]
    Http,
    /// Protobuf over a cached gRPC channel.
    Grpc,
}

impl TransportKind {
    /// Builds the transport, signing outbound calls with `secret`.
    #[must_use]
    pub fn build(self, secret: SecretString) -> Arc<dyn Transport> {
        match self {
            Self::Http => Arc::new(HttpTransport::new(secret)),
            Self::Grpc => Arc::new(GrpcTransport::new(secret)),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Grpc => write!(f, "grpc"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_parses_lowercase() {
        let kind: TransportKind = serde_json::from_str("\"grpc\"").unwrap();
        assert_eq!(kind, TransportKind::Grpc);
        assert_eq!(TransportKind::default(), TransportKind::Http);
        assert_eq!(TransportKind::Grpc.to_string(), "grpc");
    }
}
