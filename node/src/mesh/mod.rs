//! Peer mesh: identities, registry, discovery and routing.

pub mod engine;
pub mod options;
pub mod pattern;
pub mod registry;
pub mod signer;
pub mod types;

pub use engine::Mesh;
pub use options::{MeshOptions, MeshOptionsBuilder};
pub use pattern::{MatchMode, PeerPattern};
pub use types::*;
