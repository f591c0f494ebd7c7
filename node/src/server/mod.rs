//! Server adapters exposing a [`Mesh`](crate::mesh::Mesh) to remote nodes.
//!
//! Both adapters offer the same three operations: connect (authenticated
//! announce, answered with the local state), a push stream of state
//! snapshots starting with the snapshot at subscribe time, and message
//! (authenticated, answered with the handler's reply or error text).

pub mod grpc;
pub mod http;

pub use grpc::MeshService;
pub use http::router;
