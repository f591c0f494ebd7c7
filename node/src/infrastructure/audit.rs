use serde::Serialize;
use tracing::{info, warn};

/// Security-relevant node events.
#[derive(Debug, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// The node process started.
    NodeStartup {
        /// ID of the local peer.
        peer: String,
        /// Advertised address.
        address: String,
    },
    /// The node process is shutting down.
    NodeShutdown {
        /// What triggered the shutdown.
        reason: String,
    },
    /// A remote peer presented an authentication tag that did not verify.
    AccessDenied {
        /// Claimed ID of the remote peer.
        peer: String,
        /// Claimed address of the remote peer.
        address: String,
    },
}

impl AuditEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::NodeStartup { .. } => "node_startup",
            Self::NodeShutdown { .. } => "node_shutdown",
            Self::AccessDenied { .. } => "access_denied",
        }
    }
}

/// Writes `event` as JSON on the `audit` target.
///
/// Rejected authentications are logged at `warn`, lifecycle events at `info`.
pub fn log_audit(event: &AuditEvent) {
    let json = serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"));
    match event {
        AuditEvent::AccessDenied { .. } => {
            warn!(target: "audit", kind = event.kind(), audit_json = %json, "Peer authentication rejected");
        }
        _ => info!(target: "audit", kind = event.kind(), audit_json = %json, "Node lifecycle event"),
    }
}
