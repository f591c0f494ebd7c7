//! Persistent-channel transport over gRPC.
//!
//! `connect` opens (or reuses) a channel to the target address and caches a
//! client under the remote node's peer ID. `send` only looks that cache up.
//! A failed `connect` drops every client cached for that address, and a
//! successful one drops clients of other IDs that previously answered there.

use async_trait::async_trait;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use tonic::transport::Channel;
use tonic::{Code, Request, Status};
use tracing::debug;

use crate::error::MeshError;
use crate::mesh::signer::{SIGNATURE_HEADER, sign};
use crate::mesh::types::{MeshState, Peer, PeerAddress, PeerId};
use crate::transport::Transport;
use crate::transport::proto::{
    self, ConnectRequest, MessageRequest, mesh_transport_client::MeshTransportClient,
    message_response::Payload,
};

/// gRPC transport with a channel cache keyed by peer ID.
pub struct GrpcTransport {
    secret: SecretString,
    channels: RwLock<HashMap<PeerAddress, Channel>>,
    clients: RwLock<HashMap<PeerId, CachedClient>>,
}

struct CachedClient {
    address: PeerAddress,
    client: MeshTransportClient<Channel>,
}

impl GrpcTransport {
    /// Creates a transport with an empty channel cache.
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            channels: RwLock::new(HashMap::new()),
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Returns true if a channel to `id` has been established by `connect`.
    #[must_use]
    pub fn is_connected(&self, id: &PeerId) -> bool {
        self.clients.read().contains_key(id)
    }

    fn signed<T>(&self, from: &Peer, message: T) -> Result<Request<T>, MeshError> {
        let tag = sign(from, self.secret.expose_secret());
        let mut request = Request::new(message);
        request.metadata_mut().insert(
            SIGNATURE_HEADER,
            tag.parse()
                .map_err(|_| MeshError::Encoding("Signature is not valid metadata".to_string()))?,
        );
        Ok(request)
    }

    async fn channel(&self, address: &PeerAddress) -> Result<Channel, MeshError> {
        // Fast path: reuse the channel for this address
        if let Some(channel) = self.channels.read().get(address) {
            return Ok(channel.clone());
        }

        // Slow path: dial
        let channel = Channel::from_shared(address.to_url())
            .map_err(|e| MeshError::Network(format!("Invalid address {address}: {e}")))?
            .connect()
            .await
            .map_err(|e| MeshError::Network(format!("Failed to connect to {address}: {e}")))?;

        debug!(address = %address, "Opened gRPC channel");
        self.channels.write().insert(address.clone(), channel.clone());
        Ok(channel)
    }

    fn forget_channel(&self, address: &PeerAddress) {
        self.channels.write().remove(address);
    }

    fn forget_clients(&self, address: &PeerAddress) {
        self.clients.write().retain(|id, cached| {
            let keep = &cached.address != address;
            if !keep {
                debug!(peer_id = %id, address = %address, "Dropped cached gRPC client");
            }
            keep
        });
    }

    fn cache_client(
        &self,
        id: PeerId,
        address: &PeerAddress,
        client: MeshTransportClient<Channel>,
    ) {
        let mut clients = self.clients.write();
        clients.retain(|other, cached| other == &id || &cached.address != address);
        clients.insert(
            id,
            CachedClient {
                address: address.clone(),
                client,
            },
        );
    }

    async fn exchange(&self, from: &Peer, address: &PeerAddress) -> Result<MeshState, MeshError> {
        let mut client = MeshTransportClient::new(self.channel(address).await?);
        let request = self.signed(
            from,
            ConnectRequest {
                current: Some(proto::Peer::from(from)),
            },
        )?;

        let response = match client.connect(request).await {
            Ok(response) => response.into_inner(),
            Err(status) => {
                let err = status_error(&status);
                if matches!(err, MeshError::Network(_)) {
                    self.forget_channel(address);
                }
                return Err(err);
            }
        };

        let state = proto::decode_state(response.state)?;
        self.cache_client(state.current.id().clone(), address, client);
        Ok(state)
    }
}

/// Maps a gRPC status into the mesh error taxonomy.
pub(crate) fn status_error(status: &Status) -> MeshError {
    match status.code() {
        Code::Unauthenticated => MeshError::Unauthorized,
        Code::Unavailable | Code::Cancelled | Code::DeadlineExceeded => {
            MeshError::Network(status.message().to_string())
        }
        code => MeshError::Status {
            status: format!("{code:?}"),
            message: status.message().to_string(),
        },
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    async fn connect(&self, from: &Peer, address: &PeerAddress) -> Result<MeshState, MeshError> {
        let result = self.exchange(from, address).await;
        if result.is_err() {
            self.forget_clients(address);
        }
        result
    }

    async fn send(
        &self,
        from: &Peer,
        to: &Peer,
        subject: &str,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, MeshError> {
        let cached = self.clients.read().get(to.id()).map(|c| c.client.clone());
        let Some(mut client) = cached else {
            return Err(MeshError::NotConnected(to.id().clone()));
        };

        let request = self.signed(
            from,
            MessageRequest {
                from: Some(proto::Peer::from(from)),
                subject: subject.to_string(),
                body,
            },
        )?;

        let response = client
            .message(request)
            .await
            .map_err(|status| status_error(&status))?
            .into_inner();

        match response.payload {
            Some(Payload::Body(body)) => Ok(body),
            Some(Payload::Error(error)) => Err(MeshError::Remote(error)),
            None => Err(MeshError::Encoding("Empty response payload".to_string())),
        }
    }
}
