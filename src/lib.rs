//! # Energy Collector Client
//!
//! A Rust client for the energy collector pulse feed, supporting both native
//! and WASM targets.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core**: Log entries, wire decoding, the series model, rate derivation (always available, WASM-safe)
//! 2. **HTTP**: `CollectorHttp` for the log download and device configuration endpoints
//! 3. **WebSocket**: Compile-time dispatch: `tokio-tungstenite` (native) / `web-sys` (WASM)
//! 4. **Session**: one `SeriesModel` bound to one connection, plus administrative commands
//! 5. **High-Level Client**: `CollectorClient` builder deriving URLs from the device host
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use energy_collector_client::prelude::*;
//!
//! let client = CollectorClient::builder().host("192.168.1.40").build()?;
//! let mut ws = client.ws_native();
//! ws.connect();
//!
//! let mut session = client.session(ws);
//! session.attach_sink(my_chart);
//!
//! while let Some(event) = session.channel().next_event().await {
//!     session.handle_event(event)?;
//! }
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared helpers (rounding, serde adapters).
pub mod shared;

/// Domain modules (vertical slices): types, wire types, conversions, state.
pub mod domain;

/// Unified error types.
pub mod error;

/// Device address constants.
pub mod network;

/// Render sink seam.
pub mod render;

// ── Layer 2: HTTP ────────────────────────────────────────────────────────────

/// HTTP client with retry policies.
#[cfg(feature = "http")]
pub mod http;

// ── Layer 3: WebSocket ───────────────────────────────────────────────────────

/// WebSocket client: requests, connection state, events.
pub mod ws;

// ── Layer 4: Session ─────────────────────────────────────────────────────────

/// `Session` and its command dispatcher.
pub mod session;

// ── Layer 5: High-Level Client ───────────────────────────────────────────────

/// `CollectorClient`: the primary entry point.
#[cfg(feature = "http")]
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Domain types: log
    pub use crate::domain::log::{
        compute_rate, compute_rate_with, to_points, InboundMessage, IngestOutcome, ListenerId,
        LogEntry, Point, RateScale, SeriesModel,
    };

    // Domain types: device
    pub use crate::domain::device::{ConfigModeAck, LogFile};

    // Errors
    pub use crate::error::{CollectorError, HttpError, WsError};

    // Network
    pub use crate::network::{http_url_for_host, ws_url_for_host, DEFAULT_DEVICE_HOST};

    // Rendering
    pub use crate::render::{attach, RenderSink};

    // Session + commands
    pub use crate::session::{Commands, Session};

    // HTTP client + sub-clients
    #[cfg(feature = "http")]
    pub use crate::client::{CollectorClient, CollectorClientBuilder, DeviceClient};
    #[cfg(feature = "http")]
    pub use crate::http::retry::{RetryConfig, RetryPolicy};
    #[cfg(feature = "http")]
    pub use crate::http::CollectorHttp;

    // WebSocket types
    pub use crate::ws::{ConnectionState, LogChannel, MessageOut, WsConfig, WsEvent};
}
