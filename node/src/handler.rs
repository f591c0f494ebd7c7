//! Subject-keyed message handlers.
//!
//! A [`Handler`] serves one inbound [`MessageRequest`]. The [`Dispatcher`]
//! routes by subject and is itself a `Handler`, so either form can be
//! installed on the mesh. Cancellation is carried by the future: a handler
//! whose caller goes away is dropped at its next await point.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::error::MeshError;
use crate::mesh::types::MessageRequest;

/// Serves inbound application messages.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles one message and returns the reply body.
    async fn serve(&self, request: MessageRequest) -> Result<Vec<u8>>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(MessageRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>>> + Send,
{
    async fn serve(&self, request: MessageRequest) -> Result<Vec<u8>> {
        (self)(request).await
    }
}

/// Routes messages to the handler registered for their subject.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `subject`, replacing any previous one.
    pub fn handle(&mut self, subject: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers.insert(subject.into(), Arc::new(handler));
    }

    /// Builder form of [`Dispatcher::handle`].
    #[must_use]
    pub fn with(mut self, subject: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.handle(subject, handler);
        self
    }

    /// Returns the registered subjects.
    #[must_use]
    pub fn subjects(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subjects", &self.subjects())
            .finish()
    }
}

#[async_trait]
impl Handler for Dispatcher {
    async fn serve(&self, request: MessageRequest) -> Result<Vec<u8>> {
        let Some(handler) = self.handlers.get(&request.subject).cloned() else {
            debug!(subject = %request.subject, "No handler registered");
            return Err(MeshError::NoHandler(request.subject).into());
        };
        handler.serve(request).await
    }
}

/// Acknowledges every message with a JSON receipt.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandler;

#[async_trait]
impl Handler for DefaultHandler {
    async fn serve(&self, request: MessageRequest) -> Result<Vec<u8>> {
        let receipt = serde_json::json!({
            "status": "received",
            "subject": request.subject,
            "sender": request.from,
            "body": String::from_utf8_lossy(&request.body),
        });
        Ok(serde_json::to_vec(&receipt)?)
    }
}
