//! HTTP adapter: JSON endpoints and a server-sent-events state stream.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures_util::Stream;
use serde_json::json;
use tracing::{debug, warn};

use crate::mesh::Mesh;
use crate::mesh::signer::SIGNATURE_HEADER;
use crate::mesh::types::{MessageReply, MessageRequest, Peer};
use crate::transport::http::{CONNECT_PATH, HANDLE_PATH};

/// Path of the read-only state snapshot.
pub const STATE_PATH: &str = "/api/state";
/// Path of the server-sent-events state stream.
pub const SSE_PATH: &str = "/p2p/sse";

/// Creates the mesh router for `mesh`.
pub fn router(mesh: Mesh) -> Router {
    Router::new()
        .route(CONNECT_PATH, post(connect))
        .route(HANDLE_PATH, post(handle))
        .route(STATE_PATH, get(state))
        .route(SSE_PATH, get(sse))
        .with_state(mesh)
}

fn signature(headers: &HeaderMap) -> &str {
    headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn connect(State(mesh): State<Mesh>, headers: HeaderMap, body: Bytes) -> Response {
    let peer: Peer = match serde_json::from_slice(&body) {
        Ok(peer) => peer,
        Err(e) => return error(StatusCode::BAD_REQUEST, format!("Invalid peer: {e}")),
    };

    if mesh.verify(&peer, signature(&headers)).is_err() {
        return error(StatusCode::UNAUTHORIZED, "invalid signature");
    }

    debug!(peer_id = %peer.id(), "Inbound connect");
    mesh.save(peer);
    Json(mesh.state()).into_response()
}

async fn handle(State(mesh): State<Mesh>, headers: HeaderMap, body: Bytes) -> Response {
    let request: MessageRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return error(StatusCode::BAD_REQUEST, format!("Invalid message: {e}")),
    };

    if mesh.verify(&request.from, signature(&headers)).is_err() {
        return error(StatusCode::UNAUTHORIZED, "invalid signature");
    }

    let subject = request.subject.clone();
    match mesh.dispatch(request).await {
        Ok(body) => Json(MessageReply::body(body)).into_response(),
        Err(e) => {
            warn!(subject = %subject, error = %e, "Handler failed");
            (
                StatusCode::BAD_REQUEST,
                Json(MessageReply::error(e.to_string())),
            )
                .into_response()
        }
    }
}

async fn state(State(mesh): State<Mesh>) -> Response {
    Json(mesh.state()).into_response()
}

async fn sse(
    State(mesh): State<Mesh>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let mut subscription = mesh.subscribe();
    let initial = mesh.state();
    debug!("State stream opened");

    let stream = async_stream::stream! {
        yield Event::default().json_data(&initial);
        while let Some(state) = subscription.recv().await {
            yield Event::default().json_data(&state);
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
