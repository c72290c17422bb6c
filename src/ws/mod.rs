//! WebSocket layer: outbound requests, connection state, events.
//!
//! The actual WS transport is compile-time dispatched:
//! - `ws-native` feature → `tokio-tungstenite` (native.rs)
//! - `ws-wasm` feature → `web-sys::WebSocket` (wasm.rs)
//!
//! Both decode inbound frames into [`InboundMessage`] before emitting them,
//! and both request the whole log every time the socket opens.

#[cfg(feature = "ws-native")]
pub mod native;

#[cfg(feature = "ws-wasm")]
pub mod wasm;

use crate::domain::log::InboundMessage;
use crate::error::WsError;
use serde::Serialize;

// ─── Outbound messages ───────────────────────────────────────────────────────

/// Requests sent from client to device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "request")]
pub enum MessageOut {
    /// Ask for a full snapshot.
    #[serde(rename = "wholeLog")]
    WholeLog,
    /// Delete the persisted log on the device.
    #[serde(rename = "deleteDataLogFile")]
    DeleteDataLogFile,
    /// Seed the accumulated counter.
    #[serde(rename = "setInitialValue")]
    SetInitialValue { value: f64 },
}

impl std::fmt::Display for MessageOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

// ─── Connection state ────────────────────────────────────────────────────────

/// Lifecycle of the streaming connection. Sends are only valid in `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// No connection has been attempted, or it was torn down by the caller.
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Open = 2,
    /// The connection failed or the device closed it.
    Closed = 3,
}

impl From<u8> for ConnectionState {
    fn from(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closed,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl ConnectionState {
    /// Map a browser `WebSocket.readyState`. `CLOSING` counts as closed.
    pub fn from_ready_state(ready_state: u16) -> Self {
        match ready_state {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        *self == ConnectionState::Open
    }
}

// ─── WsEvent ─────────────────────────────────────────────────────────────────

/// Events emitted by the WS client to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    /// Connection established; the whole-log request has already been sent.
    Connected,
    /// A decoded message from the device.
    Message(InboundMessage),
    /// A text frame that matched no known shape.
    Malformed(String),
    /// Connection lost.
    Disconnected { code: Option<u16>, reason: String },
    /// A transport error.
    Error(String),
    /// Reconnection gave up after `max_reconnect_attempts`.
    MaxReconnectReached,
}

impl WsEvent {
    /// Decode a text frame into a `Message` or `Malformed` event.
    pub fn from_text(text: &str) -> Self {
        match InboundMessage::decode(text) {
            Ok(msg) => WsEvent::Message(msg),
            Err(e) => {
                tracing::warn!("WS decode error: {} (raw: {})", e, text);
                WsEvent::Malformed(e.to_string())
            }
        }
    }
}

// ─── Channel seam ────────────────────────────────────────────────────────────

/// What the command layer needs from a connection.
pub trait LogChannel {
    /// Send a request. Fails with [`WsError::NotConnected`] unless open.
    fn send_message(&self, message: MessageOut) -> Result<(), WsError>;

    fn connection_state(&self) -> ConnectionState;
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Configuration for the WS client.
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    /// Reconnect after an abnormal close. Off by default; the host decides.
    pub reconnect: bool,
    pub base_reconnect_delay_ms: u32,
    pub max_reconnect_attempts: u32,
    pub connect_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: crate::network::ws_url_for_host(crate::network::DEFAULT_DEVICE_HOST),
            reconnect: false,
            base_reconnect_delay_ms: 1_000,
            max_reconnect_attempts: 10,
            connect_timeout_ms: 10_000,
        }
    }
}
