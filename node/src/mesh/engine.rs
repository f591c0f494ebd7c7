//! The mesh engine: peer registry, discovery loop, routing and state fanout.

use metrics::{counter, gauge};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::error::MeshError;
use crate::fanout::{Fanout, Subscription};
use crate::handler::{DefaultHandler, Handler};
use crate::infrastructure::audit::{AuditEvent, log_audit};
use crate::mesh::options::MeshOptions;
use crate::mesh::pattern::{MatchMode, PeerPattern};
use crate::mesh::registry::PeerRegistry;
use crate::mesh::signer;
use crate::mesh::types::{MeshState, MessageRequest, Peer, PeerAddress};
use crate::transport::Transport;

const PUBLISH_CAPACITY: usize = 1;

struct Inner {
    current: RwLock<Peer>,
    seeds: Vec<PeerAddress>,
    secret: SecretString,
    registry: PeerRegistry,
    transport: Arc<dyn Transport>,
    handler: RwLock<Arc<dyn Handler>>,
    publisher: mpsc::Sender<MeshState>,
    fanout: Fanout<MeshState>,
    scan_interval: Duration,
    match_mode: MatchMode,
}

/// One node of the mesh.
///
/// Cloning is cheap and every clone drives the same node. Must be created
/// inside a Tokio runtime: construction spawns the state fanout task.
#[derive(Clone)]
pub struct Mesh {
    inner: Arc<Inner>,
}

impl Mesh {
    /// Creates a node using the transport selected in `options`.
    #[must_use]
    pub fn new(options: MeshOptions) -> Self {
        let transport = options.transport.build(options.secret.clone());
        Self::with_transport(options, transport)
    }

    /// Creates a node on top of an explicit transport.
    #[must_use]
    pub fn with_transport(options: MeshOptions, transport: Arc<dyn Transport>) -> Self {
        let current = Peer::new(options.name, options.address);
        let (publisher, source) = mpsc::channel(PUBLISH_CAPACITY);
        info!(peer_id = %current.id(), name = current.name(), address = %current.address(), "Mesh node created");

        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(current),
                seeds: options.seeds,
                secret: options.secret,
                registry: PeerRegistry::new(),
                transport,
                handler: RwLock::new(Arc::new(DefaultHandler)),
                publisher,
                fanout: Fanout::spawn(source),
                scan_interval: options.scan_interval,
                match_mode: options.match_mode,
            }),
        }
    }

    /// Runs the discovery loop forever: scan, then sleep one interval.
    ///
    /// Dropping the returned future stops the loop.
    pub async fn start(&self) {
        info!(interval = ?self.inner.scan_interval, "Discovery loop started");
        loop {
            self.scan().await;
            tokio::time::sleep(self.inner.scan_interval).await;
        }
    }

    /// Runs the discovery loop until `shutdown` resolves.
    pub async fn start_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            () = self.start() => {}
            () = shutdown => info!("Discovery loop stopped"),
        }
    }

    /// Runs one discovery pass.
    ///
    /// Seeds are probed only while the registry is empty. Every registered
    /// peer is then probed in turn and removed on the first failure, or when
    /// a different peer ID answers at its address. A snapshot is published
    /// at the end.
    #[instrument(skip(self))]
    pub async fn scan(&self) {
        if self.inner.registry.is_empty() {
            for seed in &self.inner.seeds {
                match self.discover(seed).await {
                    Ok(_) => debug!(address = %seed, "Seed discovered"),
                    Err(e) => {
                        counter!("mesh_discover_failures_total").increment(1);
                        warn!(address = %seed, error = %e, "Seed lookup failed");
                    }
                }
            }
        }

        for peer in self.inner.registry.snapshot() {
            match self.discover(peer.address()).await {
                Ok(state) if state.current.id() == peer.id() => {}
                Ok(state) => {
                    self.inner.registry.remove(peer.id());
                    counter!("mesh_peer_evictions_total").increment(1);
                    warn!(peer_id = %peer.id(), address = %peer.address(), answered_by = %state.current.id(), "Peer replaced at its address");
                }
                Err(e) => {
                    self.inner.registry.remove(peer.id());
                    counter!("mesh_peer_evictions_total").increment(1);
                    warn!(peer_id = %peer.id(), address = %peer.address(), error = %e, "Peer disconnected");
                }
            }
        }

        self.record_size();
        self.notify();
    }

    /// Announces this node to `address` and registers every peer it reports.
    ///
    /// # Errors
    /// Propagates the transport error unchanged.
    pub async fn discover(&self, address: &PeerAddress) -> Result<MeshState, MeshError> {
        let current = self.current();
        let state = self.inner.transport.connect(&current, address).await?;
        for peer in state.all() {
            self.register(peer.clone());
        }
        Ok(state)
    }

    /// Registers a peer that announced itself and publishes a snapshot.
    pub fn save(&self, peer: Peer) {
        self.register(peer);
        self.record_size();
        self.notify();
    }

    /// Upserts `peer` into the registry, stamping `refreshed_at`.
    ///
    /// Returns false without storing anything when `peer` is this node.
    pub fn register(&self, peer: Peer) -> bool {
        if peer.id() == self.inner.current.read().id() {
            return false;
        }
        let id = peer.id().clone();
        let address = peer.address().clone();
        if self.inner.registry.upsert(peer) {
            info!(peer_id = %id, address = %address, "Peer joined");
        }
        true
    }

    /// Sends `subject`/`body` to every peer whose name matches `pattern`.
    ///
    /// Per-peer failures are logged and skipped.
    ///
    /// # Errors
    /// Returns `MeshError::InvalidPattern` if `pattern` does not compile.
    #[instrument(skip(self, body))]
    pub async fn broadcast(
        &self,
        pattern: &str,
        subject: &str,
        body: impl Into<Vec<u8>>,
    ) -> Result<(), MeshError> {
        let pattern = PeerPattern::compile(pattern, self.inner.match_mode)?;
        let body = body.into();
        let current = self.current();

        for peer in self.matching(&pattern) {
            match self
                .inner
                .transport
                .send(&current, &peer, subject, body.clone())
                .await
            {
                Ok(_) => {
                    counter!("mesh_messages_sent_total").increment(1);
                }
                Err(e) => {
                    counter!("mesh_message_failures_total").increment(1);
                    warn!(peer_id = %peer.id(), error = %e, "Broadcast delivery failed");
                }
            }
        }
        Ok(())
    }

    /// Sends `subject`/`body` to the first peer whose name matches `pattern`
    /// and returns its reply. Iteration order is unspecified.
    ///
    /// # Errors
    /// `InvalidPattern` for a malformed pattern, `NoPeerMatched` when nothing
    /// matches, otherwise the transport error of the chosen peer.
    #[instrument(skip(self, body))]
    pub async fn request(
        &self,
        pattern: &str,
        subject: &str,
        body: impl Into<Vec<u8>>,
    ) -> Result<Vec<u8>, MeshError> {
        let compiled = PeerPattern::compile(pattern, self.inner.match_mode)?;
        let Some(peer) = self.matching(&compiled).into_iter().next() else {
            return Err(MeshError::NoPeerMatched(pattern.to_string()));
        };

        let result = self
            .inner
            .transport
            .send(&self.current(), &peer, subject, body.into())
            .await;
        match &result {
            Ok(_) => counter!("mesh_messages_sent_total").increment(1),
            Err(_) => counter!("mesh_message_failures_total").increment(1),
        }
        result
    }

    /// Returns a snapshot of this node and its known peers.
    #[must_use]
    pub fn state(&self) -> MeshState {
        MeshState::new(self.current(), self.inner.registry.snapshot())
    }

    /// Returns a copy of every registered peer.
    #[must_use]
    pub fn peers(&self) -> Vec<Peer> {
        self.inner.registry.snapshot()
    }

    /// Returns this node's identity.
    #[must_use]
    pub fn current(&self) -> Peer {
        self.inner.current.read().clone()
    }

    /// Changes the address this node advertises. The ID is unchanged.
    pub fn set_current_address(&self, address: PeerAddress) {
        info!(address = %address, "Advertised address changed");
        self.inner.current.write().set_address(address);
    }

    /// Installs the application handler for inbound messages.
    pub fn handle(&self, handler: impl Handler + 'static) {
        *self.inner.handler.write() = Arc::new(handler);
    }

    /// Serves one inbound message with the installed handler.
    ///
    /// # Errors
    /// Returns whatever the handler returns.
    pub async fn dispatch(&self, request: MessageRequest) -> anyhow::Result<Vec<u8>> {
        let handler: Arc<dyn Handler> = self.inner.handler.read().clone();
        handler.serve(request).await
    }

    /// Checks an inbound authentication tag against this node's secret.
    ///
    /// # Errors
    /// Returns `MeshError::Unauthorized` and emits an audit event on mismatch.
    pub fn verify(&self, peer: &Peer, tag: &str) -> Result<(), MeshError> {
        if signer::verify(peer, self.inner.secret.expose_secret(), tag) {
            return Ok(());
        }
        log_audit(&AuditEvent::AccessDenied {
            peer: peer.id().to_string(),
            address: peer.address().to_string(),
        });
        Err(MeshError::Unauthorized)
    }

    /// Attaches a new observer of published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<MeshState> {
        self.inner.fanout.subscribe()
    }

    /// Publishes the current snapshot without blocking the caller.
    pub fn notify(&self) {
        let publisher = self.inner.publisher.clone();
        let state = self.state();
        tokio::spawn(async move {
            let _ = publisher.send(state).await;
        });
    }

    fn matching(&self, pattern: &PeerPattern) -> Vec<Peer> {
        self.inner
            .registry
            .snapshot()
            .into_iter()
            .filter(|peer| pattern.is_match(peer.name()))
            .collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_size(&self) {
        gauge!("mesh_peers").set(self.inner.registry.len() as f64);
    }
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("current", &*self.inner.current.read())
            .field("peers", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}
