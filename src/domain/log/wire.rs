//! Wire types for the collector socket.
//!
//! Inbound frames come in three shapes: a bare array of entries, an object
//! carrying a `log` array, or a single entry object. They are decoded once, at
//! the connection boundary, into [`InboundMessage`].

use super::LogEntry;
use crate::error::CollectorError;
use crate::shared::serde_util::epoch_seconds;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry exactly as the firmware serializes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireEntry {
    #[serde(deserialize_with = "epoch_seconds::deserialize")]
    pub time: i64,
    #[serde(rename = "accumulatedValue")]
    pub accumulated_value: f64,
}

/// `{"log": [...]}`: fields other than `log` are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct WrappedLog {
    pub log: Vec<WireEntry>,
}

/// Every inbound shape the firmware is known to send.
#[derive(Debug, Clone)]
pub enum WireMessage {
    Log(Vec<WireEntry>),
    Wrapped(WrappedLog),
    Entry(WireEntry),
}

impl WireMessage {
    /// Dispatch on the JSON shape: array → snapshot, object with `log` →
    /// snapshot (even if it also carries `time`), any other object → entry.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Array(_) => Ok(WireMessage::Log(serde_json::from_value(value)?)),
            Value::Object(ref map) if map.contains_key("log") => {
                Ok(WireMessage::Wrapped(serde_json::from_value(value)?))
            }
            Value::Object(_) => Ok(WireMessage::Entry(serde_json::from_value(value)?)),
            other => Err(serde::de::Error::custom(format!(
                "expected an array or object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Replaces the whole series.
    Snapshot(Vec<LogEntry>),
    /// One incremental point.
    Entry(LogEntry),
}

impl InboundMessage {
    /// Decode a raw text frame. Unknown shapes are rejected, never guessed at.
    pub fn decode(raw: &str) -> Result<Self, CollectorError> {
        serde_json::from_str::<Value>(raw)
            .and_then(WireMessage::from_value)
            .map(InboundMessage::from)
            .map_err(|e| CollectorError::MalformedMessage(e.to_string()))
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self, InboundMessage::Snapshot(_))
    }
}
