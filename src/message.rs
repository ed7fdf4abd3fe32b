//! Chat message model.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::Serialize;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::format_description::well_known::{Iso8601, Rfc3339};

const ID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// The local participant. Supplied at connect time and held for the session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct User {
    pub username: String,
}

impl User {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into() }
    }
}

/// A message received from the hub. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Locally generated, `msg_<unix-millis>_<random>`.
    pub id: String,
    pub sender: String,
    pub content: String,
    /// Server-supplied time when present, otherwise local receive time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// True when `sender` matches the session username.
    pub is_own_message: bool,
}

impl ChatMessage {
    /// Build a message from an inbound hub event.
    #[must_use]
    pub fn received(sender: &str, content: &str, timestamp: Option<&str>, username: &str) -> Self {
        let timestamp = timestamp
            .and_then(|raw| {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    tracing::warn!(timestamp = raw, "unparseable message timestamp; using receive time");
                }
                parsed
            })
            .unwrap_or_else(OffsetDateTime::now_utc);

        Self {
            id: generate_message_id(),
            sender: sender.to_owned(),
            content: content.to_owned(),
            timestamp,
            is_own_message: sender == username,
        }
    }
}

/// Generate a unique message id from the current time and 9 random base-36 chars.
#[must_use]
pub fn generate_message_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| char::from(ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())]))
        .collect();
    format!("msg_{millis}_{suffix}")
}

/// Parse an ISO 8601 timestamp. Values without an offset are taken as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    OffsetDateTime::parse(raw, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(raw, &Iso8601::DEFAULT))
        .or_else(|_| PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT).map(PrimitiveDateTime::assume_utc))
        .ok()
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
