//! Engine behaviour against an in-process recording transport.
//!
//! Covers registration, discovery, eviction, routing and snapshot
//! publication without touching the network.

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use weave_node::error::MeshError;
use weave_node::handler::Dispatcher;
use weave_node::mesh::signer::sign;
use weave_node::mesh::{
    MatchMode, Mesh, MeshOptions, MeshState, MessageRequest, Peer, PeerAddress, PeerId,
};
use weave_node::transport::Transport;

const SECRET: &str = "s3cret";

#[derive(Default)]
struct RecordingTransport {
    nodes: Mutex<HashMap<PeerAddress, MeshState>>,
    failing: Mutex<HashSet<PeerId>>,
    connects: Mutex<Vec<PeerAddress>>,
    sends: Mutex<Vec<(PeerId, String, Vec<u8>)>>,
}

impl RecordingTransport {
    fn expose(&self, state: MeshState) {
        self.nodes
            .lock()
            .insert(state.current.address().clone(), state);
    }

    fn take_down(&self, address: &PeerAddress) {
        self.nodes.lock().remove(address);
    }

    fn fail_sends_to(&self, id: &PeerId) {
        self.failing.lock().insert(id.clone());
    }

    fn connects(&self) -> Vec<PeerAddress> {
        self.connects.lock().clone()
    }

    fn sends(&self) -> Vec<(PeerId, String, Vec<u8>)> {
        self.sends.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn connect(&self, _from: &Peer, address: &PeerAddress) -> Result<MeshState, MeshError> {
        self.connects.lock().push(address.clone());
        self.nodes
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| MeshError::Network(format!("connection refused: {address}")))
    }

    async fn send(
        &self,
        _from: &Peer,
        to: &Peer,
        subject: &str,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, MeshError> {
        self.sends
            .lock()
            .push((to.id().clone(), subject.to_string(), body));
        if self.failing.lock().contains(to.id()) {
            return Err(MeshError::Network("broken pipe".into()));
        }
        Ok(format!("reply from {}", to.name()).into_bytes())
    }
}

fn address(port: u16) -> PeerAddress {
    PeerAddress::new(&format!("http://127.0.0.1:{port}")).unwrap()
}

fn peer(name: &str, port: u16) -> Peer {
    Peer::new(name, address(port))
}

fn options(name: &str, port: u16) -> weave_node::mesh::MeshOptionsBuilder {
    MeshOptions::builder()
        .name(name)
        .address(address(port))
        .secret(SecretString::new(SECRET.into()))
        .scan_interval(Duration::from_millis(50))
}

fn node(transport: &Arc<RecordingTransport>, name: &str, port: u16) -> Mesh {
    Mesh::with_transport(options(name, port).build().unwrap(), transport.clone())
}

#[tokio::test]
async fn test_register_never_stores_self() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);

    assert!(!mesh.register(mesh.current()));
    assert!(mesh.peers().is_empty());
    assert!(mesh.state().peers.is_empty());
}

#[tokio::test]
async fn test_register_same_id_updates_in_place() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    let mut y = peer("y", 4001);

    mesh.register(y.clone());
    let first = mesh.peers()[0].refreshed_at();

    y.set_address(address(4101));
    mesh.register(y.clone());

    let peers = mesh.peers();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].address(), &address(4101));
    assert!(peers[0].refreshed_at() >= first);
}

#[tokio::test]
async fn test_discover_merges_remote_state_without_self() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    let (y, a, b) = (peer("y", 4001), peer("a", 4002), peer("b", 4003));
    let stale_a = a.refreshed_at();
    transport.expose(MeshState::new(
        y.clone(),
        vec![a.clone(), b.clone(), mesh.current()],
    ));

    mesh.discover(y.address()).await.unwrap();

    let ids: HashSet<PeerId> = mesh.peers().iter().map(|p| p.id().clone()).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.contains(y.id()) && ids.contains(a.id()) && ids.contains(b.id()));
    assert!(!ids.contains(mesh.current().id()));

    let stored_a = mesh.peers().into_iter().find(|p| p.id() == a.id()).unwrap();
    assert!(stored_a.refreshed_at() >= stale_a);
}

#[tokio::test]
async fn test_discover_propagates_transport_error() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);

    let err = mesh.discover(&address(4999)).await.unwrap_err();

    assert!(matches!(err, MeshError::Network(_)));
    assert!(mesh.peers().is_empty());
}

#[tokio::test]
async fn test_scan_uses_seeds_only_while_registry_is_empty() {
    let transport = Arc::new(RecordingTransport::default());
    let y = peer("y", 4001);
    transport.expose(MeshState::new(y.clone(), vec![]));

    let options = options("x", 4000)
        .seed(address(4001))
        .seed(address(4999))
        .build()
        .unwrap();
    let mesh = Mesh::with_transport(options, transport.clone());

    mesh.scan().await;
    // Both seeds, then the one peer learned from the reachable seed.
    assert_eq!(
        transport.connects(),
        vec![address(4001), address(4999), address(4001)]
    );
    assert_eq!(mesh.peers().len(), 1);

    mesh.scan().await;
    assert_eq!(transport.connects().len(), 4);
    assert_eq!(transport.connects()[3], address(4001));
}

#[tokio::test]
async fn test_scan_evicts_unreachable_peer() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    let (y, z) = (peer("y", 4001), peer("z", 4002));
    transport.expose(MeshState::new(y.clone(), vec![]));
    transport.expose(MeshState::new(z.clone(), vec![]));
    mesh.register(y.clone());
    mesh.register(z.clone());

    transport.take_down(z.address());
    mesh.scan().await;

    let peers = mesh.peers();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].id(), y.id());
}

#[tokio::test]
async fn test_scan_evicts_peer_replaced_at_same_address() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    let old_y = peer("y", 4001);
    mesh.register(old_y.clone());

    let new_y = peer("y", 4001);
    transport.expose(MeshState::new(new_y.clone(), vec![]));
    for _ in 0..3 {
        mesh.scan().await;
    }

    let ids: Vec<PeerId> = mesh.peers().iter().map(|p| p.id().clone()).collect();
    assert_eq!(ids, vec![new_y.id().clone()]);

    mesh.broadcast("y", "ping", b"hi".to_vec()).await.unwrap();
    let sends = transport.sends();
    assert_eq!(sends.len(), 1);
    assert_eq!(&sends[0].0, new_y.id());
}

#[tokio::test]
async fn test_broadcast_is_best_effort() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    let peers = [peer("a", 4001), peer("b", 4002), peer("c", 4003)];
    for p in &peers {
        mesh.register(p.clone());
    }
    transport.fail_sends_to(peers[1].id());

    mesh.broadcast("*", "ping", b"hi".to_vec()).await.unwrap();

    let sends = transport.sends();
    assert_eq!(sends.len(), 3);
    let reached: HashSet<PeerId> = sends.iter().map(|(id, _, _)| id.clone()).collect();
    assert!(peers.iter().all(|p| reached.contains(p.id())));
    assert!(sends.iter().all(|(_, s, b)| s == "ping" && b == b"hi"));
}

#[tokio::test]
async fn test_broadcast_filters_by_name_glob() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    let (y1, y2, z) = (peer("y-1", 4001), peer("y-2", 4002), peer("z", 4003));
    for p in [&y1, &y2, &z] {
        mesh.register(p.clone());
    }

    mesh.broadcast("y-?", "ping", b"hi".to_vec()).await.unwrap();

    let reached: HashSet<PeerId> = transport.sends().into_iter().map(|(id, _, _)| id).collect();
    assert_eq!(reached.len(), 2);
    assert!(!reached.contains(z.id()));
}

#[tokio::test]
async fn test_broadcast_rejects_malformed_pattern() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    mesh.register(peer("y", 4001));

    let err = mesh.broadcast("[y", "ping", b"hi".to_vec()).await.unwrap_err();

    assert!(matches!(err, MeshError::InvalidPattern { .. }));
    assert!(transport.sends().is_empty());
}

#[tokio::test]
async fn test_request_returns_first_match_reply() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    mesh.register(peer("y", 4001));
    mesh.register(peer("z", 4002));

    let reply = mesh.request("y", "ping", b"hi".to_vec()).await.unwrap();

    assert_eq!(reply, b"reply from y");
    assert_eq!(transport.sends().len(), 1);
}

#[tokio::test]
async fn test_request_does_not_fall_back_to_second_match() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    let (w1, w2) = (peer("worker-1", 4001), peer("worker-2", 4002));
    mesh.register(w1.clone());
    mesh.register(w2.clone());
    transport.fail_sends_to(w1.id());
    transport.fail_sends_to(w2.id());

    let err = mesh
        .request("worker-*", "job", b"1".to_vec())
        .await
        .unwrap_err();

    assert!(matches!(err, MeshError::Network(_)));
    assert_eq!(transport.sends().len(), 1);
}

#[tokio::test]
async fn test_request_without_match_never_sends() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    mesh.register(peer("y", 4001));

    let err = mesh
        .request("nonexistent-*", "ping", b"hi".to_vec())
        .await
        .unwrap_err();

    assert!(matches!(err, MeshError::NoPeerMatched(p) if p == "nonexistent-*"));
    assert!(transport.sends().is_empty());
}

#[tokio::test]
async fn test_regex_match_mode() {
    let transport = Arc::new(RecordingTransport::default());
    let options = options("x", 4000)
        .match_mode(MatchMode::Regex)
        .build()
        .unwrap();
    let mesh = Mesh::with_transport(options, transport.clone());
    mesh.register(peer("db-primary", 4001));

    let reply = mesh.request("^db-", "ping", b"".to_vec()).await.unwrap();

    assert_eq!(reply, b"reply from db-primary");
}

#[tokio::test]
async fn test_save_publishes_snapshot() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    let mut subscription = mesh.subscribe();
    let y = peer("y", 4001);

    mesh.save(y.clone());

    let state = timeout(Duration::from_secs(1), subscription.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.current.id(), mesh.current().id());
    assert_eq!(state.peers.len(), 1);
    assert_eq!(state.peers[0].id(), y.id());
}

#[tokio::test]
async fn test_snapshot_reaches_every_subscriber_until_unsubscribed() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    let mut first = mesh.subscribe();
    let mut second = mesh.subscribe();

    mesh.save(peer("y", 4001));
    let a = timeout(Duration::from_secs(1), first.recv()).await.unwrap().unwrap();
    let b = timeout(Duration::from_secs(1), second.recv()).await.unwrap().unwrap();
    assert_eq!(a, b);

    second.unsubscribe();
    mesh.save(peer("z", 4002));
    let next = timeout(Duration::from_secs(1), first.recv()).await.unwrap().unwrap();
    assert_eq!(next.peers.len(), 2);
}

#[tokio::test]
async fn test_verify_rejects_wrong_secret() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    let y = peer("y", 4001);

    assert!(mesh.verify(&y, &sign(&y, SECRET)).is_ok());
    assert!(matches!(
        mesh.verify(&y, &sign(&y, "wrong")),
        Err(MeshError::Unauthorized)
    ));
    assert!(matches!(mesh.verify(&y, ""), Err(MeshError::Unauthorized)));
}

#[tokio::test]
async fn test_dispatch_uses_installed_handler() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    let from = peer("y", 4001);

    let receipt = mesh
        .dispatch(MessageRequest::new(from.clone(), "ping", b"hi".to_vec()))
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&receipt).unwrap();
    assert_eq!(json["status"], "received");

    mesh.handle(Dispatcher::new().with("echo", |req: MessageRequest| async move {
        Ok::<_, anyhow::Error>(req.body)
    }));
    let echoed = mesh
        .dispatch(MessageRequest::new(from.clone(), "echo", b"hi".to_vec()))
        .await
        .unwrap();
    assert_eq!(echoed, b"hi");

    let err = mesh
        .dispatch(MessageRequest::new(from, "ping", b"hi".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MeshError>(),
        Some(MeshError::NoHandler(_))
    ));
}

#[tokio::test]
async fn test_set_current_address_keeps_identity() {
    let transport = Arc::new(RecordingTransport::default());
    let mesh = node(&transport, "x", 4000);
    let before = mesh.current();

    mesh.set_current_address(PeerAddress::new("https://x.tunnel.example").unwrap());

    let after = mesh.current();
    assert_eq!(after.id(), before.id());
    assert_eq!(after.created_at(), before.created_at());
    assert_eq!(after.address().as_str(), "https://x.tunnel.example");
    assert!(after.updated_at() >= before.updated_at());
}

#[tokio::test]
async fn test_start_until_stops_on_shutdown() {
    let transport = Arc::new(RecordingTransport::default());
    let options = options("x", 4000).seed(address(4999)).build().unwrap();
    let mesh = Mesh::with_transport(options, transport.clone());
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn({
        let mesh = mesh.clone();
        async move {
            mesh.start_until(async {
                let _ = stop_rx.await;
            })
            .await;
        }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(transport.connects().len() >= 2, "loop should rescan the seed");

    stop_tx.send(()).unwrap();
    timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
}
