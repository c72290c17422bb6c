//! Unified client error types.
//!
//! Every variant is a non-fatal notification for the host: none of them
//! leaves the series in a partially updated state.

use thiserror::Error;

/// Top-level client error.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// A command needed the socket but it was not open.
    #[error("Not connected to the energy collector")]
    ConnectionUnavailable,

    /// An inbound payload had no recognizable shape. The series is untouched.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Log download failed: {0}")]
    DownloadFailed(String),

    #[error("Configuration mode request failed: {0}")]
    ConfigModeFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),
}

/// HTTP-layer errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[cfg(feature = "http")]
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Timeout")]
    Timeout,

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// WebSocket errors.
#[derive(Error, Debug)]
pub enum WsError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

impl CollectorError {
    /// Map a socket send failure onto the condition surfaced to the user.
    pub(crate) fn from_send(err: WsError) -> Self {
        match err {
            WsError::NotConnected => CollectorError::ConnectionUnavailable,
            other => CollectorError::Ws(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_send_maps_not_connected_to_unavailable() {
        assert!(matches!(
            CollectorError::from_send(WsError::NotConnected),
            CollectorError::ConnectionUnavailable
        ));
        assert!(matches!(
            CollectorError::from_send(WsError::SendFailed("full".into())),
            CollectorError::Ws(WsError::SendFailed(_))
        ));
    }
}
