//! Errors surfaced to callers of the connection manager.
//!
//! Connect and send failures are returned for the UI layer to display.
//! Disconnect never fails from the caller's point of view.

use std::time::Duration;

use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// `start` did not settle within the hard connect timeout.
    #[error("Connection timeout after {} seconds", .0.as_secs())]
    ConnectTimeout(Duration),
    /// The transport could not be built or rejected the connection.
    #[error("Connection failed: {0}")]
    Connect(#[source] TransportError),
    #[error("Not connected to hub")]
    NotConnected,
    #[error("Message content cannot be empty")]
    EmptyContent,
    /// The hub call was rejected or the link dropped mid-send.
    #[error("Failed to send message: {0}")]
    Send(#[source] TransportError),
}
