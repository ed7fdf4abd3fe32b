//! Connection manager.
//!
//! DESIGN
//! ======
//! One manager owns at most one transport. `connect` tears down any previous
//! transport, builds a fresh one through the injected `TransportFactory`,
//! registers a single ordered sink on all four event channels, and races
//! `start` against the hard connect timeout.
//!
//! Each connection gets an event pump task that applies hub events to the
//! shared `ChatSession` in emission order. Dropping a connection aborts its
//! pump first, which closes the sink, so a replaced transport can never
//! deliver into the session again.
//!
//! STATE OWNERSHIP
//! ===============
//! Only the manager and its pump mutate the session. Callers observe it
//! through `watch` receivers or a cloned `ChatSession`.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::HubConfig;
use crate::error::ChatError;
use crate::events::{EventKind, HubEvent, SEND_MESSAGE};
use crate::message::{ChatMessage, User};
use crate::state::{ChatSession, ConnectionState, ConnectionStatus};
use crate::transport::{HubTransport, TransportFactory};

/// The live transport and the task feeding its events into the session.
struct ActiveConnection {
    transport: Arc<dyn HubTransport>,
    pump: JoinHandle<()>,
}

impl ActiveConnection {
    /// Stop the pump and wait until it can no longer touch the session.
    async fn halt_pump(&mut self) {
        self.pump.abort();
        let _ = (&mut self.pump).await;
    }
}

pub struct ConnectionManager {
    config: HubConfig,
    factory: Arc<dyn TransportFactory>,
    session: ChatSession,
    user: User,
    active: Option<ActiveConnection>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(config: HubConfig, factory: Arc<dyn TransportFactory>) -> Self {
        Self::with_session(config, factory, ChatSession::new())
    }

    /// Build a manager that publishes into an existing session.
    #[must_use]
    pub fn with_session(config: HubConfig, factory: Arc<dyn TransportFactory>, session: ChatSession) -> Self {
        Self {
            config,
            factory,
            session,
            user: User::default(),
            active: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.session.state().subscribe()
    }

    #[must_use]
    pub fn messages(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.session.messages().subscribe()
    }

    /// Username supplied to the last `connect`, empty before the first.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.user.username
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Connect to the hub as `username`.
    ///
    /// Any existing connection is fully disconnected first. On failure the
    /// session ends in `Failed` with the error text recorded, and the error
    /// is also returned.
    ///
    /// # Errors
    ///
    /// `Connect` when the transport cannot be built or refuses to start,
    /// `ConnectTimeout` when `start` does not settle within
    /// `HubConfig::connect_timeout`.
    pub async fn connect(&mut self, username: &str) -> Result<(), ChatError> {
        if self.active.is_some() {
            self.disconnect().await;
        }

        self.user = User::new(username);
        self.session.state().update(ConnectionState::begin_connecting);
        info!(username, url = %self.config.hub_url(), "connecting to hub");

        let transport = match self.factory.build(&self.config) {
            Ok(transport) => transport,
            Err(e) => return Err(self.fail(ChatError::Connect(e))),
        };
        let pump = spawn_event_pump(transport.as_ref(), self.session.clone(), self.user.username.clone());
        let mut active = ActiveConnection { transport, pump };

        let outcome = tokio::time::timeout(self.config.connect_timeout, active.transport.start()).await;
        let err = match outcome {
            Ok(Ok(())) => {
                // The pump may already have applied a link drop.
                self.session.state().update(|s| {
                    if s.status == ConnectionStatus::Connecting {
                        s.mark_connected();
                    }
                });
                self.active = Some(active);
                info!(username, "connected to hub");
                return Ok(());
            }
            Ok(Err(e)) => ChatError::Connect(e),
            Err(_) => ChatError::ConnectTimeout(self.config.connect_timeout),
        };

        active.halt_pump().await;
        if let Err(e) = active.transport.stop().await {
            warn!(error = %e, "failed to stop abandoned transport");
        }
        Err(self.fail(err))
    }

    /// Close the current connection, if any.
    ///
    /// Always leaves the session `Disconnected` with no error. Shutdown
    /// failures are logged.
    pub async fn disconnect(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        active.halt_pump().await;
        if let Err(e) = active.transport.stop().await {
            error!(error = %e, "error disconnecting from hub");
        }
        self.session.state().update(ConnectionState::mark_disconnected);
        info!(username = %self.user.username, "disconnected from hub");
    }

    /// Post `content` to the hub as the session user.
    ///
    /// # Errors
    ///
    /// `NotConnected` unless a connection is open and connected,
    /// `EmptyContent` for blank content, `Send` when the hub call fails.
    pub async fn send_message(&self, content: &str) -> Result<(), ChatError> {
        let Some(active) = self.active.as_ref().filter(|_| self.session.is_connected()) else {
            return Err(ChatError::NotConnected);
        };
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyContent);
        }

        let arguments = vec![Value::from(self.user.username.as_str()), Value::from(content)];
        active.transport.invoke(SEND_MESSAGE, arguments).await.map_err(|e| {
            error!(error = %e, "error sending message");
            ChatError::Send(e)
        })
    }

    /// Empty the message history. Connection state is untouched.
    pub fn clear_messages(&self) {
        self.session.clear_messages();
    }

    fn fail(&self, err: ChatError) -> ChatError {
        error!(error = %err, "hub connection failed");
        let message = err.to_string();
        self.session.state().update(|s| s.mark_failed(message));
        err
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.pump.abort();
        }
    }
}

// =============================================================================
// EVENT PUMP
// =============================================================================

fn spawn_event_pump(transport: &dyn HubTransport, session: ChatSession, username: String) -> JoinHandle<()> {
    let (sink, mut inbox) = mpsc::unbounded_channel();
    for kind in EventKind::ALL {
        transport.subscribe(kind, sink.clone());
    }
    drop(sink);

    tokio::spawn(async move {
        while let Some(event) = inbox.recv().await {
            apply_event(&session, &username, event);
        }
    })
}

/// Apply one hub event to the session.
pub(crate) fn apply_event(session: &ChatSession, username: &str, event: HubEvent) {
    match event {
        HubEvent::Message { sender, content, timestamp } => {
            let message = ChatMessage::received(&sender, &content, timestamp.as_deref(), username);
            debug!(id = %message.id, sender = %message.sender, "message received");
            session.push_message(message);
        }
        HubEvent::Reconnecting { error } => {
            warn!(error = ?error, "hub connection lost, reconnecting");
            session.state().update(ConnectionState::mark_reconnecting);
        }
        HubEvent::Reconnected => {
            info!("hub connection restored");
            session.state().update(ConnectionState::mark_connected);
        }
        HubEvent::Closed { error } => {
            match &error {
                Some(e) => error!(error = %e, "hub connection closed"),
                None => info!("hub connection closed"),
            }
            session.state().update(|s| s.mark_closed(error));
        }
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
