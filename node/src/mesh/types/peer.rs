//! Peer identity types for the mesh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error type for validation failures
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The peer ID is empty or contains only whitespace.
    EmptyId,
    /// The peer address is empty or contains only whitespace.
    EmptyAddress,
    /// The address format is invalid with a descriptive message.
    InvalidAddressFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyId => write!(f, "Peer ID cannot be empty"),
            ValidationError::EmptyAddress => write!(f, "Peer address cannot be empty"),
            ValidationError::InvalidAddressFormat(msg) => {
                write!(f, "Invalid address format: {msg}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Opaque unique identifier of a mesh participant.
///
/// Generated once when the peer is created and never changed afterwards. It is
/// the only stable join key between registries.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Creates a new unique peer ID with a generated UUID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Creates a `PeerId` from a string, validating it is non-empty.
    ///
    /// # Errors
    /// Returns `ValidationError::EmptyId` if the provided string is empty.
    pub fn try_from_str(s: &str) -> Result<Self, ValidationError> {
        if s.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        Ok(Self(s.to_string()))
    }

    /// Returns the string representation of this `PeerId`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<String> for PeerId {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from_str(&s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reachable endpoint of a peer, e.g. `http://127.0.0.1:3000`.
///
/// Deserialization goes through [`PeerAddress::new`], so JSON and protobuf
/// input are normalized the same way.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Creates a new `PeerAddress` from a string, validating it is non-empty
    /// and free of inner whitespace.
    ///
    /// # Errors
    /// Returns `ValidationError::EmptyAddress` if the address is empty.
    /// Returns `ValidationError::InvalidAddressFormat` if the address contains whitespace.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidAddressFormat(format!(
                "'{trimmed}' contains whitespace"
            )));
        }
        Ok(Self(trimmed.trim_end_matches('/').to_string()))
    }

    /// Returns the string representation of this `PeerAddress`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the address as a URL, prefixing `http://` when no scheme is present.
    #[must_use]
    pub fn to_url(&self) -> String {
        if self.0.contains("://") {
            self.0.clone()
        } else {
            format!("http://{}", self.0)
        }
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one mesh participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    /// Unique identifier, immutable for the peer's lifetime.
    id: PeerId,
    /// Human-assigned label used for pattern matching. Not unique.
    name: String,
    /// Reachable endpoint. May change without changing `id`.
    address: PeerAddress,
    /// Creation time, immutable.
    created_at: DateTime<Utc>,
    /// Last time `address` changed.
    updated_at: DateTime<Utc>,
    /// Last time this record was (re)registered by any node.
    refreshed_at: DateTime<Utc>,
}

impl Peer {
    /// Creates a brand new peer identity with a fresh ID and all timestamps set to now.
    #[must_use]
    pub fn new(name: impl Into<String>, address: PeerAddress) -> Self {
        let now = Utc::now();
        Self {
            id: PeerId::new(),
            name: name.into(),
            address,
            created_at: now,
            updated_at: now,
            refreshed_at: now,
        }
    }

    /// Rebuilds a peer from its wire representation.
    #[must_use]
    pub fn from_parts(
        id: PeerId,
        name: String,
        address: PeerAddress,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        refreshed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            address,
            created_at,
            updated_at,
            refreshed_at,
        }
    }

    /// Returns the peer ID.
    #[must_use]
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Returns the peer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the peer address.
    #[must_use]
    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    /// Returns the creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last address change time.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the last registration time.
    #[must_use]
    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    /// Moves the peer to a new address, stamping `updated_at` and `refreshed_at`.
    pub fn set_address(&mut self, address: PeerAddress) {
        let now = Utc::now();
        self.address = address;
        self.updated_at = now;
        self.refreshed_at = now;
    }

    /// Stamps `refreshed_at` with the current time.
    pub fn refresh(&mut self) {
        self.refreshed_at = Utc::now();
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.name, self.address, self.id)
    }
}
