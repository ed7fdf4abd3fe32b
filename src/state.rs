//! Observable session state consumed by presentation layers.
//!
//! DESIGN
//! ======
//! `Observable<T>` is a value holder over `tokio::sync::watch`: readers take
//! snapshots or subscribe for change notifications, only this crate mutates.
//! `ChatSession` bundles the connection record and the message history for
//! one client session. It is cloneable and injected into the manager, so
//! several independent sessions (or test doubles) can coexist.
//!
//! INVARIANT
//! =========
//! `ConnectionState::connected == (status == Connected)` after every mutator.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::message::ChatMessage;

// =============================================================================
// OBSERVABLE
// =============================================================================

/// Shared value with subscribe/notify semantics.
#[derive(Debug)]
pub struct Observable<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self { tx: Arc::clone(&self.tx) }
    }
}

impl<T> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        let (tx, _rx) = watch::channel(value);
        Self { tx: Arc::new(tx) }
    }

    /// Receiver that is notified on every mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Run `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Mutate in place and notify subscribers.
    pub(crate) fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone> Observable<T> {
    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }
}

// =============================================================================
// CONNECTION STATE
// =============================================================================

/// Connection lifecycle status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionStatus {
    /// Whether `next` is an edge of the lifecycle state machine.
    ///
    /// Any status may move to `Connecting` through an explicit connect.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionStatus::{Connected, Connecting, Disconnected, Failed, Reconnecting};

        matches!(
            (self, next),
            (_, Connecting)
                | (Connecting, Connected | Failed | Disconnected)
                | (Connected, Reconnecting | Disconnected)
                | (Reconnecting, Connected | Disconnected)
                | (Failed | Disconnected, Disconnected)
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

/// Connection health for one session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub connected: bool,
    pub status: ConnectionStatus,
    /// Last human-readable failure, if any.
    pub error: Option<String>,
}

impl ConnectionState {
    fn set_status(&mut self, status: ConnectionStatus) {
        if !self.status.can_transition_to(status) {
            tracing::warn!(from = self.status.as_str(), to = status.as_str(), "unexpected connection transition");
        }
        self.status = status;
        self.connected = status == ConnectionStatus::Connected;
    }

    pub(crate) fn begin_connecting(&mut self) {
        self.set_status(ConnectionStatus::Connecting);
    }

    pub(crate) fn mark_connected(&mut self) {
        self.set_status(ConnectionStatus::Connected);
        self.error = None;
    }

    pub(crate) fn mark_failed(&mut self, error: String) {
        self.set_status(ConnectionStatus::Failed);
        self.error = Some(error);
    }

    pub(crate) fn mark_reconnecting(&mut self) {
        self.set_status(ConnectionStatus::Reconnecting);
    }

    pub(crate) fn mark_closed(&mut self, error: Option<String>) {
        self.set_status(ConnectionStatus::Disconnected);
        self.error = error;
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.set_status(ConnectionStatus::Disconnected);
        self.error = None;
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Observable state for one client session.
#[derive(Clone, Debug, Default)]
pub struct ChatSession {
    state: Observable<ConnectionState>,
    messages: Observable<Vec<ChatMessage>>,
}

impl ChatSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &Observable<ConnectionState> {
        &self.state
    }

    #[must_use]
    pub fn messages(&self) -> &Observable<Vec<ChatMessage>> {
        &self.messages
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.with(|s| s.connected)
    }

    pub(crate) fn push_message(&self, message: ChatMessage) {
        self.messages.update(|list| list.push(message));
    }

    pub(crate) fn clear_messages(&self) {
        self.messages.update(Vec::clear);
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
