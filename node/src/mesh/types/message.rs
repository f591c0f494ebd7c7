//! Application message envelopes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::peer::Peer;

/// An application payload addressed to a peer.
///
/// On the HTTP wire the body travels as a base64 string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRequest {
    /// Sender identity.
    pub from: Peer,
    /// Routing key for the receiving dispatcher.
    pub subject: String,
    /// Opaque payload.
    #[serde(with = "base64_bytes", default)]
    pub body: Vec<u8>,
}

impl MessageRequest {
    /// Creates a new message envelope.
    #[must_use]
    pub fn new(from: Peer, subject: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            from,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Reply envelope: either a body or an error string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageReply {
    /// Handler output on success.
    #[serde(
        with = "base64_opt_bytes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub body: Option<Vec<u8>>,
    /// Handler error text on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageReply {
    /// A successful reply.
    #[must_use]
    pub fn body(body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            error: None,
        }
    }

    /// A failed reply.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            body: None,
            error: Some(message.into()),
        }
    }

    /// Converts the envelope into a result. A non-empty error wins over a body.
    ///
    /// # Errors
    /// Returns the remote error text when the reply carries one.
    pub fn into_result(self) -> Result<Vec<u8>, String> {
        match self.error {
            Some(error) if !error.is_empty() => Err(error),
            _ => Ok(self.body.unwrap_or_default()),
        }
    }
}

mod base64_bytes {
    use super::{Deserialize, Deserializer, Engine, STANDARD, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

mod base64_opt_bytes {
    use super::{Deserialize, Deserializer, Engine, STANDARD, Serialize, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        bytes
            .as_ref()
            .map(|b| STANDARD.encode(b))
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}
