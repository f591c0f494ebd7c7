//! State-watch clients.
//!
//! Both clients connect to a node's state stream and forward every decoded
//! [`MeshState`] into an `mpsc` channel. They return when the stream ends or
//! the receiving side is dropped.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tonic::transport::Channel;
use tracing::{debug, info};

use crate::error::MeshError;
use crate::mesh::types::{MeshState, PeerAddress};
use crate::server::http::SSE_PATH;
use crate::transport::grpc::status_error;
use crate::transport::proto::{self, StateRequest, mesh_transport_client::MeshTransportClient};

/// Follows the server-sent-events stream of the node at `address`.
///
/// # Errors
/// `Network` or `Status` when the stream cannot be opened or breaks,
/// `Encoding` when an event does not carry a valid state.
pub async fn watch_http(address: &PeerAddress, tx: mpsc::Sender<MeshState>) -> Result<(), MeshError> {
    let url = format!("{}{SSE_PATH}", address.to_url());
    let res = reqwest::Client::new()
        .get(&url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| MeshError::Network(e.to_string()))?;

    if !res.status().is_success() {
        return Err(MeshError::Status {
            status: res.status().as_u16().to_string(),
            message: res.text().await.unwrap_or_default(),
        });
    }

    info!(url = %url, "Watching state over HTTP");
    let mut body = res.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| MeshError::Network(e.to_string()))?;
        buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

        while let Some(end) = buffer.windows(2).position(|w| w == b"\n\n") {
            let event: Vec<u8> = buffer.drain(..end + 2).collect();
            let Some(data) = event_data(&String::from_utf8_lossy(&event)) else {
                continue;
            };
            let state: MeshState =
                serde_json::from_str(&data).map_err(|e| MeshError::Encoding(e.to_string()))?;
            if tx.send(state).await.is_err() {
                debug!("State receiver closed");
                return Ok(());
            }
        }
    }

    debug!(url = %url, "State stream ended");
    Ok(())
}

/// Joins the `data:` lines of one event. Returns `None` for comments and
/// keep-alives.
fn event_data(event: &str) -> Option<String> {
    let lines: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Follows the gRPC `State` stream of the node at `address`.
///
/// # Errors
/// `Network` when the channel cannot be opened, a mapped status when the
/// stream fails, `Encoding` when a message does not carry a valid state.
pub async fn watch_grpc(address: &PeerAddress, tx: mpsc::Sender<MeshState>) -> Result<(), MeshError> {
    let channel = Channel::from_shared(address.to_url())
        .map_err(|e| MeshError::Network(format!("Invalid address {address}: {e}")))?
        .connect()
        .await
        .map_err(|e| MeshError::Network(format!("Failed to connect to {address}: {e}")))?;
    let mut client = MeshTransportClient::new(channel);

    let mut stream = client
        .state(StateRequest {})
        .await
        .map_err(|status| status_error(&status))?
        .into_inner();

    info!(address = %address, "Watching state over gRPC");
    while let Some(response) = stream.message().await.map_err(|status| status_error(&status))? {
        let state = proto::decode_state(response.state)?;
        if tx.send(state).await.is_err() {
            debug!("State receiver closed");
            return Ok(());
        }
    }

    debug!(address = %address, "State stream ended");
    Ok(())
}
