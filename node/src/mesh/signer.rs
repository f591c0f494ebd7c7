//! Shared-secret authentication tags for peer identities.
//!
//! The tag is a SHA-256 over `id || name || address || secret`, hex encoded.
//! The secret is always passed explicitly so nodes with different secrets can
//! live in one process.
//!
//! Verification is a plain string comparison and is not constant-time.

use sha2::{Digest, Sha256};

use crate::mesh::types::Peer;

/// Header (HTTP) and metadata key (gRPC) carrying the tag.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Computes the authentication tag for `peer` under `secret`.
#[must_use]
pub fn sign(peer: &Peer, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(peer.id().as_str().as_bytes());
    hasher.update(peer.name().as_bytes());
    hasher.update(peer.address().as_str().as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Recomputes the tag for `peer` and compares it with `tag`.
#[must_use]
pub fn verify(peer: &Peer, secret: &str, tag: &str) -> bool {
    sign(peer, secret) == tag
}
