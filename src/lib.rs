//! Hub chat client.
//!
//! ARCHITECTURE
//! ============
//! `ConnectionManager` owns the realtime link to a chat hub and publishes
//! connection health and received messages through a `ChatSession` of
//! `watch`-backed observables. The link itself sits behind the
//! `HubTransport` trait; `HubConnection` is the networked implementation.

pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod message;
pub mod state;
pub mod transport;

pub use config::{ConfigError, HubConfig, TransportKind};
pub use error::ChatError;
pub use events::{EventDispatcher, EventKind, HubEvent};
pub use manager::ConnectionManager;
pub use message::{ChatMessage, User};
pub use state::{ChatSession, ConnectionState, ConnectionStatus, Observable};
pub use transport::{HubConnection, HubConnectionFactory, HubTransport, TransportError, TransportFactory};
