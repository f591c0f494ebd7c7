//! Weave - a self-organizing peer mesh.
//!
//! Nodes discover each other through a gossip-style scan loop, keep a
//! best-effort registry of reachable peers, and exchange application messages
//! by name pattern (`broadcast` to every match, `request` to the first). The
//! wire protocol is pluggable: JSON over HTTP or protobuf over gRPC.
//!
//! ```no_run
//! use weave_node::mesh::{Mesh, MeshOptions, PeerAddress};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let options = MeshOptions::builder()
//!     .name("x")
//!     .address(PeerAddress::new("http://127.0.0.1:3000")?)
//!     .seed(PeerAddress::new("http://127.0.0.1:3001")?)
//!     .build()?;
//! let mesh = Mesh::new(options);
//! tokio::spawn({
//!     let mesh = mesh.clone();
//!     async move { mesh.start().await }
//! });
//! mesh.broadcast("y-*", "ping", b"hi".to_vec()).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Error taxonomy.
pub mod error;
/// Single-source, multi-subscriber state fanout.
pub mod fanout;
/// Message handlers and the subject dispatcher.
pub mod handler;
/// Infrastructure components (config, server bootstrap, telemetry, audit).
pub mod infrastructure;
/// Peer mesh engine and its data model.
pub mod mesh;
/// Clients that follow a node's state stream.
pub mod monitor;
/// HTTP and gRPC server adapters.
pub mod server;
/// Wire transports.
pub mod transport;

pub use error::MeshError;
pub use handler::{DefaultHandler, Dispatcher, Handler};
pub use mesh::{Mesh, MeshOptions};
