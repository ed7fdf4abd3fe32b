//! Realtime transport to the chat hub.
//!
//! ARCHITECTURE
//! ============
//! The manager only sees the `HubTransport` trait: start, stop, invoke, and
//! per-channel event subscriptions. `HubConnection` is the production
//! implementation; tests inject doubles through `TransportFactory`.
//!
//! `HubConnection` negotiates a link (WebSocket first, server-sent events as
//! fallback), runs a supervisor task that dispatches inbound frames, and
//! reconnects on the configured backoff schedule when the link drops.

mod connection;
mod link;
mod sse;
mod ws;

use std::sync::Arc;

use serde_json::Value;

use crate::config::{ConfigError, HubConfig};
use crate::events::{EventKind, EventSink};

pub use connection::HubConnection;

/// Error raised by a transport operation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The hub URL could not be derived from config.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// WebSocket connect or I/O failure.
    #[error("websocket error: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    /// HTTP failure on the server-sent-events transport.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// A frame could not be encoded or decoded.
    #[error("frame codec failed: {0}")]
    Codec(#[from] frames::CodecError),
    /// The hub rejected or never answered the handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),
    /// Every configured transport failed to open.
    #[error("unable to connect with any transport: {0}")]
    NoTransport(String),
    /// No link is open.
    #[error("connection is not active")]
    NotActive,
    /// `start` was called on a connection that is already running.
    #[error("connection already started")]
    AlreadyStarted,
    /// The link closed while an operation was in flight.
    #[error("connection closed")]
    Closed,
    /// The hub returned an error completion for an invocation.
    #[error("hub method failed: {0}")]
    Hub(String),
    /// No completion arrived for an invocation in time.
    #[error("timed out waiting for hub response")]
    InvocationTimeout,
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(err))
    }
}

/// One realtime connection to the hub.
#[async_trait::async_trait]
pub trait HubTransport: Send + Sync {
    /// Open the connection. Resolves once a link is established.
    async fn start(&self) -> Result<(), TransportError>;

    /// Close the connection and stop reconnecting.
    async fn stop(&self) -> Result<(), TransportError>;

    /// Call `method` on the hub and wait for its completion.
    async fn invoke(&self, method: &str, arguments: Vec<Value>) -> Result<(), TransportError>;

    /// Register `sink` on one event channel.
    fn subscribe(&self, kind: EventKind, sink: EventSink);
}

/// Builds a fresh transport for each connect.
pub trait TransportFactory: Send + Sync {
    fn build(&self, config: &HubConfig) -> Result<Arc<dyn HubTransport>, TransportError>;
}

/// Factory for [`HubConnection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HubConnectionFactory;

impl TransportFactory for HubConnectionFactory {
    fn build(&self, config: &HubConfig) -> Result<Arc<dyn HubTransport>, TransportError> {
        Ok(Arc::new(HubConnection::new(config.clone())?))
    }
}
