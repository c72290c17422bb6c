//! Device sub-client: log download and network configuration.

use crate::domain::device::{ConfigModeAck, LogFile};
use crate::error::CollectorError;
use crate::http::CollectorHttp;

/// Sub-client for the device's HTTP endpoints.
pub struct Device<'a> {
    pub(crate) http: &'a CollectorHttp,
}

impl<'a> Device<'a> {
    pub fn new(http: &'a CollectorHttp) -> Self {
        Self { http }
    }

    pub async fn download_log(&self) -> Result<LogFile, CollectorError> {
        self.http.download_log().await.map_err(|e| {
            tracing::error!("Log download failed: {}", e);
            CollectorError::DownloadFailed(e.to_string())
        })
    }

    pub async fn enter_config_mode(&self) -> Result<ConfigModeAck, CollectorError> {
        let message = self.http.enter_config_mode().await.map_err(|e| {
            tracing::error!("Entering configuration mode failed: {}", e);
            CollectorError::ConfigModeFailed(e.to_string())
        })?;
        tracing::warn!("Device accepted configuration mode; it may become unreachable");
        Ok(ConfigModeAck::new(message))
    }

    pub async fn reset_network_config(&self) -> Result<ConfigModeAck, CollectorError> {
        let message = self.http.reset_network_config().await.map_err(|e| {
            tracing::error!("Resetting network configuration failed: {}", e);
            CollectorError::ConfigModeFailed(e.to_string())
        })?;
        tracing::warn!("Device network configuration reset; it may become unreachable");
        Ok(ConfigModeAck::new(message))
    }
}
