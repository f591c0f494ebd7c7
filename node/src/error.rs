//! Error taxonomy for mesh operations.

use thiserror::Error;

use crate::mesh::types::PeerId;

/// Errors produced by the mesh engine, its transports and dispatchers.
#[derive(Debug, Error)]
pub enum MeshError {
    /// The remote could not be reached or the connection broke mid-call.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote rejected the authentication tag, or a local check failed.
    #[error("Invalid signature")]
    Unauthorized,

    /// The remote answered with a non-success status.
    #[error("Remote returned status {status}: {message}")]
    Status {
        /// Protocol status (HTTP code or gRPC code name).
        status: String,
        /// Error text carried by the response, if any.
        message: String,
    },

    /// The remote handler reported an application error in the reply envelope.
    #[error("Remote error: {0}")]
    Remote(String),

    /// A persistent-channel transport has no channel for the target peer.
    #[error("Peer {0} is not connected")]
    NotConnected(PeerId),

    /// No handler is registered for the message subject.
    #[error("No handler for subject '{0}'")]
    NoHandler(String),

    /// No registered peer matched the routing pattern.
    #[error("No peer matched pattern '{0}'")]
    NoPeerMatched(String),

    /// The routing pattern could not be compiled.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as supplied by the caller.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An envelope could not be encoded or decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl MeshError {
    /// Returns true for failures raised by the transport layer
    /// (network, status, authentication, remote handler, missing channel).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Unauthorized
                | Self::Status { .. }
                | Self::Remote(_)
                | Self::NotConnected(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_classified() {
        assert!(MeshError::Unauthorized.is_transport());
        assert!(MeshError::Remote("x".into()).is_transport());
        assert!(!MeshError::NoPeerMatched("y-*".into()).is_transport());
        assert!(!MeshError::Encoding("bad".into()).is_transport());
    }

    #[test]
    fn status_error_message_includes_text() {
        let err = MeshError::Status {
            status: "400".into(),
            message: "No handler for subject 'ping'".into(),
        };
        assert_eq!(
            err.to_string(),
            "Remote returned status 400: No handler for subject 'ping'"
        );
    }
}
