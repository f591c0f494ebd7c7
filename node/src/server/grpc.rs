//! gRPC adapter for `mesh.MeshTransport`.

use futures_util::Stream;
use std::pin::Pin;
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

use crate::mesh::Mesh;
use crate::mesh::signer::SIGNATURE_HEADER;
use crate::mesh::types as domain;
use crate::transport::proto::{
    self, ConnectRequest, ConnectResponse, MessageRequest, MessageResponse, StateRequest,
    StateResponse, mesh_transport_server::MeshTransport, message_response::Payload,
};

/// gRPC service implementation backed by a mesh node.
pub struct MeshService {
    mesh: Mesh,
}

impl MeshService {
    /// Wraps `mesh`.
    #[must_use]
    pub fn new(mesh: Mesh) -> Self {
        Self { mesh }
    }

    fn authenticate(&self, peer: &domain::Peer, tag: &str) -> Result<(), Status> {
        self.mesh
            .verify(peer, tag)
            .map_err(|_| Status::unauthenticated("invalid signature"))
    }
}

fn signature<T>(request: &Request<T>) -> String {
    request
        .metadata()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tonic::async_trait]
impl MeshTransport for MeshService {
    async fn connect(
        &self,
        request: Request<ConnectRequest>,
    ) -> Result<Response<ConnectResponse>, Status> {
        let tag = signature(&request);
        let peer = proto::decode_peer(request.into_inner().current)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        self.authenticate(&peer, &tag)?;

        debug!(peer_id = %peer.id(), "Inbound connect");
        self.mesh.save(peer);
        Ok(Response::new(ConnectResponse {
            state: Some(proto::State::from(&self.mesh.state())),
        }))
    }

    type StateStream = Pin<Box<dyn Stream<Item = Result<StateResponse, Status>> + Send>>;

    async fn state(
        &self,
        _request: Request<StateRequest>,
    ) -> Result<Response<Self::StateStream>, Status> {
        let mut subscription = self.mesh.subscribe();
        let initial = self.mesh.state();
        debug!("State stream opened");

        let stream = async_stream::stream! {
            yield Ok::<_, Status>(StateResponse { state: Some(proto::State::from(&initial)) });
            while let Some(state) = subscription.recv().await {
                yield Ok::<_, Status>(StateResponse { state: Some(proto::State::from(&state)) });
            }
        };

        Ok(Response::new(Box::pin(stream)))
    }

    async fn message(
        &self,
        request: Request<MessageRequest>,
    ) -> Result<Response<MessageResponse>, Status> {
        let tag = signature(&request);
        let message = request.into_inner();
        let from = proto::decode_peer(message.from)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        self.authenticate(&from, &tag)?;

        let subject = message.subject.clone();
        let request = domain::MessageRequest::new(from, message.subject, message.body);
        let payload = match self.mesh.dispatch(request).await {
            Ok(body) => Payload::Body(body),
            Err(e) => {
                warn!(subject = %subject, error = %e, "Handler failed");
                Payload::Error(e.to_string())
            }
        };

        Ok(Response::new(MessageResponse {
            payload: Some(payload),
        }))
    }
}
