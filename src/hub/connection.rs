use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Opaque event body handed to every subscriber of a topic.
/// Serialised once by the publishing side, shared by all deliveries.
pub type Payload = Arc<str>;

/// Identity of a subscriber's connection within a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Errors raised while delivering a payload to one subscriber
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Connection closed")]
    Closed,

    #[error("Outbound queue full")]
    Backpressure,

    #[error("Delivery timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Message-oriented channel to one client, provided by the transport layer.
///
/// The hub only needs two things from a connection: a way to push a payload
/// and a way to learn that the peer went away.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Stable identity used as the registry key
    fn id(&self) -> ConnectionId;

    /// Deliver one payload to the client
    async fn send(&self, payload: Payload) -> Result<(), DeliveryError>;

    /// Resolves once the underlying transport has closed
    async fn closed(&self);
}
