//! Device domain: administrative artifacts and acknowledgements.

#[cfg(feature = "http")]
pub mod client;

use serde::{Deserialize, Serialize};

/// The persisted log as served by the device. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl LogFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Accepted request to change the device's network/operating mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigModeAck {
    /// Whatever text the device answered with.
    pub message: String,
    /// The device usually drops its station connection right after
    /// accepting, so the socket and HTTP endpoint may vanish. Always `true`.
    pub transport_may_drop: bool,
}

impl ConfigModeAck {
    pub(crate) fn new(message: String) -> Self {
        Self {
            message,
            transport_may_drop: true,
        }
    }
}
