//! High-level client: `CollectorClient` with sub-client accessors.
//!
//! One client per device. It derives socket and HTTP URLs from the device
//! host and hands out connections and sessions; it holds no series itself.

use crate::domain::device::client::Device;
use crate::error::CollectorError;
use crate::http::{CollectorHttp, RetryConfig};
use crate::network::{http_url_for_host, ws_url_for_host, DEFAULT_DEVICE_HOST};
use crate::session::Session;
use crate::ws::{LogChannel, WsConfig};

use std::time::Duration;

// Re-export sub-client types for convenience.
pub use crate::domain::device::client::Device as DeviceClient;

/// The primary entry point for talking to one energy collector.
#[derive(Clone)]
pub struct CollectorClient {
    pub(crate) http: CollectorHttp,
    pub(crate) ws_config: WsConfig,
}

impl CollectorClient {
    pub fn builder() -> CollectorClientBuilder {
        CollectorClientBuilder::default()
    }

    // ── Sub-client accessors ─────────────────────────────────────────────

    pub fn device(&self) -> Device<'_> {
        Device::new(&self.http)
    }

    pub fn http(&self) -> &CollectorHttp {
        &self.http
    }

    /// The WS config for creating a connection.
    ///
    /// The connection is not embedded in the client: its lifetime belongs to
    /// the page (or task) that renders the series.
    pub fn ws_config(&self) -> &WsConfig {
        &self.ws_config
    }

    /// Create a new native WS client from the current config.
    #[cfg(feature = "ws-native")]
    pub fn ws_native(&self) -> crate::ws::native::WsClient {
        crate::ws::native::WsClient::new(self.ws_config.clone())
    }

    /// Build a session over `channel` with this client's HTTP endpoints.
    pub fn session<C: LogChannel>(&self, channel: C) -> Session<C> {
        Session::new(channel).with_http(self.http.clone())
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct CollectorClientBuilder {
    host: String,
    ws_url: Option<String>,
    base_url: Option<String>,
    reconnect: bool,
    http_timeout: Duration,
    download_retry: Option<RetryConfig>,
}

impl Default for CollectorClientBuilder {
    fn default() -> Self {
        Self {
            host: DEFAULT_DEVICE_HOST.to_string(),
            ws_url: None,
            base_url: None,
            reconnect: false,
            http_timeout: Duration::from_secs(30),
            download_retry: None,
        }
    }
}

impl CollectorClientBuilder {
    /// Device host (`hostname[:port]`); both URLs are derived from it.
    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Override the derived socket URL.
    pub fn ws_url(mut self, url: &str) -> Self {
        self.ws_url = Some(url.to_string());
        self
    }

    /// Override the derived HTTP base URL.
    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }

    pub fn reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Retry schedule for log downloads. Defaults to [`RetryConfig::idempotent`].
    pub fn download_retry(mut self, config: RetryConfig) -> Self {
        self.download_retry = Some(config);
        self
    }

    pub fn build(self) -> Result<CollectorClient, CollectorError> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| http_url_for_host(&self.host));
        let ws_url = self.ws_url.unwrap_or_else(|| ws_url_for_host(&self.host));

        let mut http = CollectorHttp::with_timeout(&base_url, self.http_timeout)?;
        if let Some(config) = self.download_retry {
            http = http.with_download_retry(config);
        }

        Ok(CollectorClient {
            http,
            ws_config: WsConfig {
                url: ws_url,
                reconnect: self.reconnect,
                ..WsConfig::default()
            },
        })
    }
}
