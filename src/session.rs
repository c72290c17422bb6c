//! Session: one live series bound to one connection.
//!
//! The session owns the [`SeriesModel`], borrows nothing global, and is the
//! single place connection events turn into model mutations. Administrative
//! commands go through [`Session::commands`].

use crate::domain::log::{IngestOutcome, LogEntry, SeriesModel};
use crate::error::CollectorError;
use crate::render::{self, RenderSink};
use crate::ws::{ConnectionState, LogChannel, MessageOut, WsEvent};

#[cfg(feature = "http")]
use crate::domain::device::client::Device;
#[cfg(feature = "http")]
use crate::domain::device::{ConfigModeAck, LogFile};
#[cfg(feature = "http")]
use crate::http::CollectorHttp;

/// A live view of the collector: connection handle, series, HTTP endpoints.
pub struct Session<C: LogChannel> {
    channel: C,
    model: SeriesModel,
    #[cfg(feature = "http")]
    http: Option<CollectorHttp>,
}

impl<C: LogChannel> Session<C> {
    pub fn new(channel: C) -> Self {
        Self::with_model(channel, SeriesModel::new())
    }

    pub fn with_model(channel: C, model: SeriesModel) -> Self {
        Self {
            channel,
            model,
            #[cfg(feature = "http")]
            http: None,
        }
    }

    /// Enable `download_log` and the device configuration commands.
    #[cfg(feature = "http")]
    pub fn with_http(mut self, http: CollectorHttp) -> Self {
        self.http = Some(http);
        self
    }

    /// Subscribe a render sink to the series.
    pub fn attach_sink<S: RenderSink + 'static>(&mut self, sink: S) -> crate::domain::log::ListenerId {
        render::attach(&mut self.model, sink)
    }

    /// Route a connection event into the model.
    ///
    /// Returns the ingest outcome for messages, `Ok(None)` for lifecycle
    /// events, and `MalformedMessage` for frames the connection could not
    /// decode.
    pub fn handle_event(&mut self, event: WsEvent) -> Result<Option<IngestOutcome>, CollectorError> {
        match event {
            WsEvent::Message(msg) => Ok(Some(self.model.apply(msg))),
            WsEvent::Malformed(e) => Err(CollectorError::MalformedMessage(e)),
            WsEvent::Connected => {
                tracing::info!("Connected; waiting for whole log");
                Ok(None)
            }
            WsEvent::Disconnected { code, reason } => {
                tracing::info!(
                    "Disconnected (code={:?}, reason={}); keeping {} entries until next snapshot",
                    code,
                    reason,
                    self.model.len()
                );
                Ok(None)
            }
            WsEvent::Error(e) => {
                tracing::warn!("Connection error: {}", e);
                Ok(None)
            }
            WsEvent::MaxReconnectReached => {
                tracing::warn!("Gave up reconnecting to the collector");
                Ok(None)
            }
        }
    }

    /// Decode and apply a raw frame directly.
    pub fn ingest(&mut self, payload: &str) -> Result<IngestOutcome, CollectorError> {
        self.model.ingest(payload)
    }

    /// Periodic render tick.
    pub fn refresh(&mut self) {
        self.model.refresh();
    }

    pub fn commands(&mut self) -> Commands<'_, C> {
        Commands { session: self }
    }

    pub fn model(&self) -> &SeriesModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut SeriesModel {
        &mut self.model
    }

    pub fn entries(&self) -> &[LogEntry] {
        self.model.entries()
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.model.snapshot()
    }

    pub fn rate(&self) -> f64 {
        self.model.rate()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.connection_state()
    }

    pub fn into_parts(self) -> (C, SeriesModel) {
        (self.channel, self.model)
    }
}

// ─── Commands ────────────────────────────────────────────────────────────────

/// Administrative commands. Each one is independent: a failure leaves the
/// series and the connection exactly as the command found them, apart from
/// the optimistic clear in [`clear_log`](Self::clear_log).
pub struct Commands<'a, C: LogChannel> {
    session: &'a mut Session<C>,
}

impl<'a, C: LogChannel> Commands<'a, C> {
    /// Delete the device log and clear the local series immediately.
    ///
    /// The local clear happens even when the socket is down; the device stays
    /// authoritative and the next snapshot restores whatever it still holds.
    pub fn clear_log(&mut self) -> Result<(), CollectorError> {
        let sent = self.send(MessageOut::DeleteDataLogFile);
        self.session.model.clear();
        tracing::info!("Cleared local series");
        sent
    }

    /// Ask for a fresh snapshot.
    pub fn request_whole_log(&mut self) -> Result<(), CollectorError> {
        self.send(MessageOut::WholeLog)
    }

    /// Seed the device's accumulated counter. The series is left alone.
    pub fn set_initial_value(&mut self, value: f64) -> Result<(), CollectorError> {
        if !value.is_finite() {
            return Err(CollectorError::Validation(format!(
                "initial value must be finite, got {}",
                value
            )));
        }
        self.send(MessageOut::SetInitialValue { value })
    }

    /// Fetch the persisted log file. Never touches the series.
    #[cfg(feature = "http")]
    pub async fn download_log(&self) -> Result<LogFile, CollectorError> {
        let http = self.http().map_err(CollectorError::DownloadFailed)?;
        Device::new(http).download_log().await
    }

    /// Switch the device into network configuration mode.
    ///
    /// On success the socket and HTTP endpoint may disappear shortly after;
    /// that is expected and not reported as an error.
    #[cfg(feature = "http")]
    pub async fn enter_config_mode(&self) -> Result<ConfigModeAck, CollectorError> {
        let http = self.http().map_err(CollectorError::ConfigModeFailed)?;
        Device::new(http).enter_config_mode().await
    }

    /// Wipe stored Wi-Fi credentials on the device.
    #[cfg(feature = "http")]
    pub async fn reset_network_config(&self) -> Result<ConfigModeAck, CollectorError> {
        let http = self.http().map_err(CollectorError::ConfigModeFailed)?;
        Device::new(http).reset_network_config().await
    }

    // ── Internal ──────────────────────────────────────────────────────────

    fn send(&self, message: MessageOut) -> Result<(), CollectorError> {
        self.session.channel.send_message(message).map_err(|e| {
            let err = CollectorError::from_send(e);
            tracing::warn!("Command not delivered: {}", err);
            err
        })
    }

    #[cfg(feature = "http")]
    fn http(&self) -> Result<&CollectorHttp, String> {
        self.session
            .http
            .as_ref()
            .ok_or_else(|| "no HTTP endpoint configured".to_string())
    }
}
