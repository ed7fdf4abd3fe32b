//! Hub event dispatch.
//!
//! DESIGN
//! ======
//! Transport lifecycle callbacks and pushed hub invocations are modelled as
//! named channels (`EventKind`) carrying typed payloads (`HubEvent`).
//! Subscribers register an unbounded sink per channel; emitting fans the
//! event out to every live sink on its channel and prunes closed ones.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

/// Inbound hub method carrying a chat message.
pub const RECEIVE_MESSAGE: &str = "ReceiveMessage";
/// Outbound hub method for posting a chat message.
pub const SEND_MESSAGE: &str = "SendMessage";

/// Event channel names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    Reconnecting,
    Reconnected,
    Closed,
}

impl EventKind {
    pub const ALL: [Self; 4] = [Self::Message, Self::Reconnecting, Self::Reconnected, Self::Closed];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Message => RECEIVE_MESSAGE,
            Self::Reconnecting => "reconnecting",
            Self::Reconnected => "reconnected",
            Self::Closed => "close",
        }
    }
}

/// Typed event payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// A chat message pushed by the hub.
    Message {
        sender: String,
        content: String,
        /// ISO 8601 time assigned by the hub, if it sent one.
        timestamp: Option<String>,
    },
    /// The link dropped and automatic reconnection started.
    Reconnecting { error: Option<String> },
    /// Automatic reconnection succeeded.
    Reconnected,
    /// The connection ended, with the error that caused it if any.
    Closed { error: Option<String> },
}

impl HubEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message { .. } => EventKind::Message,
            Self::Reconnecting { .. } => EventKind::Reconnecting,
            Self::Reconnected => EventKind::Reconnected,
            Self::Closed { .. } => EventKind::Closed,
        }
    }

    /// Map a pushed hub invocation onto an event.
    ///
    /// Returns `None` for unknown targets and a missing or non-string sender
    /// or content. A timestamp that is not a string is dropped and the
    /// message is still delivered.
    #[must_use]
    pub fn from_invocation(target: &str, arguments: &[Value]) -> Option<Self> {
        if target != RECEIVE_MESSAGE {
            return None;
        }
        let sender = arguments.first()?.as_str()?;
        let content = arguments.get(1)?.as_str()?;
        let timestamp = match arguments.get(2) {
            None | Some(Value::Null) => None,
            Some(Value::String(ts)) if ts.is_empty() => None,
            Some(Value::String(ts)) => Some(ts.clone()),
            Some(other) => {
                warn!(sender, timestamp = %other, "ignoring non-string message timestamp");
                None
            }
        };
        Some(Self::Message {
            sender: sender.to_owned(),
            content: content.to_owned(),
            timestamp,
        })
    }
}

/// Sending half of a subscription. One sink may be registered on several
/// channels to receive their events in emission order.
pub type EventSink = mpsc::UnboundedSender<HubEvent>;
/// Receiving half of a subscription.
pub type EventReceiver = mpsc::UnboundedReceiver<HubEvent>;

/// Fan-out of hub events to per-channel subscribers.
#[derive(Debug, Clone, Default)]
pub struct EventDispatcher {
    subscribers: Arc<Mutex<HashMap<EventKind, Vec<EventSink>>>>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` on one channel. Dropping the receiver unsubscribes.
    pub fn subscribe(&self, kind: EventKind, sink: EventSink) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(sink);
    }

    /// Deliver `event` to every live subscriber of its channel.
    ///
    /// Returns how many subscribers received it.
    pub fn emit(&self, event: &HubEvent) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = subscribers.get_mut(&event.kind()) else {
            return 0;
        };
        list.retain(|tx| tx.send(event.clone()).is_ok());
        list.len()
    }

    /// Live subscriber count on `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.get_mut(&kind).map_or(0, |list| {
            list.retain(|tx| !tx.is_closed());
            list.len()
        })
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
