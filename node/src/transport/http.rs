//! Connection-per-call transport over HTTP and JSON.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::MeshError;
use crate::mesh::signer::{SIGNATURE_HEADER, sign};
use crate::mesh::types::{MeshState, MessageReply, MessageRequest, Peer, PeerAddress};
use crate::transport::Transport;

/// Path of the connect endpoint on every node.
pub const CONNECT_PATH: &str = "/api/connect";
/// Path of the message endpoint on every node.
pub const HANDLE_PATH: &str = "/api/handle";

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Stateless HTTP transport. Every call is an independent `POST`.
pub struct HttpTransport {
    client: Client,
    secret: SecretString,
}

impl HttpTransport {
    /// Creates a transport without a request timeout.
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self::with_client(Client::new(), secret)
    }

    /// Creates a transport whose calls fail after `timeout`.
    ///
    /// # Errors
    /// Returns `MeshError::Network` if the HTTP client cannot be built.
    pub fn with_timeout(secret: SecretString, timeout: Duration) -> Result<Self, MeshError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MeshError::Network(e.to_string()))?;
        Ok(Self::with_client(client, secret))
    }

    /// Creates a transport on top of a preconfigured client.
    #[must_use]
    pub fn with_client(client: Client, secret: SecretString) -> Self {
        Self { client, secret }
    }

    fn tag(&self, peer: &Peer) -> String {
        sign(peer, self.secret.expose_secret())
    }

    async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, MeshError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(MeshError::Unauthorized);
        }

        let text = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        Err(MeshError::Status {
            status: status.as_u16().to_string(),
            message,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self, from: &Peer, address: &PeerAddress) -> Result<MeshState, MeshError> {
        let url = format!("{}{CONNECT_PATH}", address.to_url());
        debug!(url = %url, "Connecting to peer");

        let res = self
            .client
            .post(&url)
            .header(SIGNATURE_HEADER, self.tag(from))
            .json(from)
            .send()
            .await
            .map_err(|e| MeshError::Network(e.to_string()))?;

        Self::check_status(res)
            .await?
            .json::<MeshState>()
            .await
            .map_err(|e| MeshError::Encoding(format!("Invalid state from {address}: {e}")))
    }

    async fn send(
        &self,
        from: &Peer,
        to: &Peer,
        subject: &str,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, MeshError> {
        let url = format!("{}{HANDLE_PATH}", to.address().to_url());
        debug!(url = %url, subject, "Sending message");

        let message = MessageRequest::new(from.clone(), subject, body);
        let res = self
            .client
            .post(&url)
            .header(SIGNATURE_HEADER, self.tag(from))
            .json(&message)
            .send()
            .await
            .map_err(|e| MeshError::Network(e.to_string()))?;

        let reply: MessageReply = Self::check_status(res)
            .await?
            .json()
            .await
            .map_err(|e| MeshError::Encoding(format!("Invalid reply from {}: {e}", to.id())))?;

        reply.into_result().map_err(MeshError::Remote)
    }
}
