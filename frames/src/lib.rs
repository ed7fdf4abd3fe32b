//! Hub frame model and codecs for the realtime chat transport.
//!
//! This crate owns the wire representation exchanged with the chat hub.
//! Invocation arguments stay flexible (`serde_json::Value`); the WebSocket
//! transport encodes frames as protobuf binary, the server-sent-events
//! transport as JSON text.

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol name announced in the client handshake.
pub const PROTOCOL: &str = "hubchat.v1";

/// Error returned by the decode functions.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as a protobuf `WireFrame`.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The `kind` integer on the wire does not map to a known [`FrameKind`].
    #[error("invalid frame kind: {0}")]
    InvalidKind(i32),
    /// A JSON text frame could not be parsed or produced.
    #[error("invalid json frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// Role of a frame in the hub protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// Protocol negotiation; sent once by each side when a link opens.
    Handshake,
    /// Remote method call (client → hub) or pushed event (hub → client).
    Invocation,
    /// Result of an invocation that carried an `invocation_id`.
    Completion,
    /// Keepalive.
    Ping,
    /// Hub is closing the link.
    Close,
}

impl FrameKind {
    /// Convert kind into wire enum integer value.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Handshake => WireFrameKind::Handshake as i32,
            Self::Invocation => WireFrameKind::Invocation as i32,
            Self::Completion => WireFrameKind::Completion as i32,
            Self::Ping => WireFrameKind::Ping as i32,
            Self::Close => WireFrameKind::Close as i32,
        }
    }

    fn from_i32(value: i32) -> Result<Self, CodecError> {
        match WireFrameKind::try_from(value) {
            Ok(WireFrameKind::Handshake) => Ok(Self::Handshake),
            Ok(WireFrameKind::Invocation) => Ok(Self::Invocation),
            Ok(WireFrameKind::Completion) => Ok(Self::Completion),
            Ok(WireFrameKind::Ping) => Ok(Self::Ping),
            Ok(WireFrameKind::Close) => Ok(Self::Close),
            Err(_) => Err(CodecError::InvalidKind(value)),
        }
    }
}

/// A single message on the hub wire protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// What this frame is.
    pub kind: FrameKind,
    /// Correlates an invocation with its completion. Absent for pushed events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    /// Method name for invocations (e.g. `"SendMessage"`), protocol name for handshakes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Positional invocation arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Value>,
    /// Failure text on handshake, completion, or close frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// On close frames: whether the client may reconnect.
    #[serde(default)]
    pub allow_reconnect: bool,
}

impl Frame {
    fn bare(kind: FrameKind) -> Self {
        Self {
            kind,
            invocation_id: None,
            target: None,
            arguments: Vec::new(),
            error: None,
            allow_reconnect: false,
        }
    }

    /// Client handshake naming `protocol`.
    #[must_use]
    pub fn handshake(protocol: &str) -> Self {
        Self {
            target: Some(protocol.to_owned()),
            ..Self::bare(FrameKind::Handshake)
        }
    }

    /// Hub handshake reply. `None` accepts the client.
    #[must_use]
    pub fn handshake_reply(error: Option<String>) -> Self {
        Self {
            error,
            ..Self::bare(FrameKind::Handshake)
        }
    }

    /// Invocation of `target`. Pass an id to request a completion.
    #[must_use]
    pub fn invocation(invocation_id: Option<String>, target: &str, arguments: Vec<Value>) -> Self {
        Self {
            invocation_id,
            target: Some(target.to_owned()),
            arguments,
            ..Self::bare(FrameKind::Invocation)
        }
    }

    /// Completion for `invocation_id`; `error` marks a failed call.
    #[must_use]
    pub fn completion(invocation_id: &str, error: Option<String>) -> Self {
        Self {
            invocation_id: Some(invocation_id.to_owned()),
            error,
            ..Self::bare(FrameKind::Completion)
        }
    }

    #[must_use]
    pub fn ping() -> Self {
        Self::bare(FrameKind::Ping)
    }

    #[must_use]
    pub fn close(error: Option<String>, allow_reconnect: bool) -> Self {
        Self {
            error,
            allow_reconnect,
            ..Self::bare(FrameKind::Close)
        }
    }
}

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let wire = frame_to_wire(frame);

    let mut out = Vec::with_capacity(wire.encoded_len());
    // Encoding into a growable Vec cannot hit `BufferTooSmall`.
    wire.encode(&mut out).unwrap_or_default();
    out
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes and
/// [`CodecError::InvalidKind`] for out-of-range kind values.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    wire_to_frame(wire)
}

/// Encode a frame as a single-line JSON document.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if an argument cannot be serialized.
pub fn encode_json(frame: &Frame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed text or unknown kinds.
pub fn decode_json(text: &str) -> Result<Frame, CodecError> {
    Ok(serde_json::from_str(text)?)
}

fn frame_to_wire(frame: &Frame) -> WireFrame {
    WireFrame {
        kind: frame.kind.as_i32(),
        invocation_id: frame.invocation_id.clone(),
        target: frame.target.clone(),
        arguments: frame.arguments.iter().map(json_to_proto_value).collect(),
        error: frame.error.clone(),
        allow_reconnect: frame.allow_reconnect,
    }
}

fn wire_to_frame(wire: WireFrame) -> Result<Frame, CodecError> {
    Ok(Frame {
        kind: FrameKind::from_i32(wire.kind)?,
        invocation_id: wire.invocation_id,
        target: wire.target,
        arguments: wire.arguments.iter().map(proto_to_json_value).collect(),
        error: wire.error,
        allow_reconnect: wire.allow_reconnect,
    })
}

fn json_to_proto_value(value: &Value) -> prost_types::Value {
    use prost_types::value::Kind;

    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(v) => Kind::BoolValue(*v),
        Value::Number(v) => Kind::NumberValue(v.as_f64().unwrap_or(0.0)),
        Value::String(v) => Kind::StringValue(v.clone()),
        Value::Array(v) => Kind::ListValue(prost_types::ListValue {
            values: v.iter().map(json_to_proto_value).collect(),
        }),
        Value::Object(v) => Kind::StructValue(prost_types::Struct {
            fields: v
                .iter()
                .map(|(k, v)| (k.clone(), json_to_proto_value(v)))
                .collect(),
        }),
    };

    prost_types::Value { kind: Some(kind) }
}

fn proto_to_json_value(value: &prost_types::Value) -> Value {
    use prost_types::value::Kind;

    match &value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::NumberValue(v)) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
        Some(Kind::StringValue(v)) => Value::String(v.clone()),
        Some(Kind::BoolValue(v)) => Value::Bool(*v),
        Some(Kind::StructValue(v)) => Value::Object(
            v.fields
                .iter()
                .map(|(k, v)| (k.clone(), proto_to_json_value(v)))
                .collect(),
        ),
        Some(Kind::ListValue(v)) => Value::Array(v.values.iter().map(proto_to_json_value).collect()),
    }
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(enumeration = "WireFrameKind", tag = "1")]
    kind: i32,
    #[prost(string, optional, tag = "2")]
    invocation_id: Option<String>,
    #[prost(string, optional, tag = "3")]
    target: Option<String>,
    #[prost(message, repeated, tag = "4")]
    arguments: Vec<prost_types::Value>,
    #[prost(string, optional, tag = "5")]
    error: Option<String>,
    #[prost(bool, tag = "6")]
    allow_reconnect: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
enum WireFrameKind {
    Handshake = 0,
    Invocation = 1,
    Completion = 2,
    Ping = 3,
    Close = 4,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
