//! Shared test utilities for integration tests.
//!
//! Spawns mesh nodes behind the HTTP adapter on ephemeral loopback ports and
//! provides polling helpers for eventually-consistent assertions.

use anyhow::Result;
use secrecy::SecretString;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use weave_node::mesh::{Mesh, MeshOptions, PeerAddress};
use weave_node::server::router;

/// Shared secret used by every test node.
pub const SECRET: &str = "integration-secret";

/// Scan interval used by every test node.
pub const SCAN_INTERVAL: Duration = Duration::from_millis(150);

/// A running node: engine, HTTP server and discovery loop.
pub struct TestNode {
    /// The node's engine.
    pub mesh: Mesh,
    /// Advertised address.
    pub address: String,
    shutdown: Option<oneshot::Sender<()>>,
    server: JoinHandle<()>,
    discovery: Option<JoinHandle<()>>,
}

impl TestNode {
    /// Binds an ephemeral port and serves a node named `name` seeded with `seeds`.
    pub async fn spawn(name: &str, seeds: &[&str]) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let address = format!("http://{}", listener.local_addr()?);

        let options = MeshOptions::builder()
            .name(name)
            .address(PeerAddress::new(&address)?)
            .seeds(
                seeds
                    .iter()
                    .map(|s| PeerAddress::new(s))
                    .collect::<Result<Vec<_>, _>>()?,
            )
            .secret(SecretString::new(SECRET.into()))
            .scan_interval(SCAN_INTERVAL)
            .build()?;
        let mesh = Mesh::new(options);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(mesh.clone());
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            mesh,
            address,
            shutdown: Some(shutdown_tx),
            server,
            discovery: None,
        })
    }

    /// Starts the discovery loop.
    pub fn start(&mut self) {
        let mesh = self.mesh.clone();
        self.discovery = Some(tokio::spawn(async move { mesh.start().await }));
    }

    /// Stops the discovery loop and the server. The port refuses connections afterwards.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(discovery) = self.discovery.take() {
            discovery.abort();
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        timeout(Duration::from_secs(5), self.server).await??;
        Ok(())
    }

    /// Returns the sorted names of the peers this node knows.
    pub fn peer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .mesh
            .peers()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        names.sort();
        names
    }
}

/// Polls `check` until it holds or five seconds pass.
pub async fn eventually(what: &str, check: impl Fn() -> bool) -> Result<()> {
    timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("timed out waiting for {what}"))
}
