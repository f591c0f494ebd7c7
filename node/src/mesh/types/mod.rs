//! Core types for the peer mesh.

pub mod message;
pub mod peer;
pub mod state;

pub use message::{MessageReply, MessageRequest};
pub use peer::{Peer, PeerAddress, PeerId, ValidationError};
pub use state::MeshState;
