//! Native WebSocket client: `tokio-tungstenite`.
//!
//! - Background tokio task for connection management
//! - Whole-log request on every open
//! - Optional exponential backoff reconnection with jitter
//! - Stream-based event delivery to consumer
//!
//! Sends are rejected unless the socket is open; nothing is queued.

use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream, Stream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::WsError;
use crate::ws::{ConnectionState, LogChannel, MessageOut, WsConfig, WsEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Send(MessageOut),
    Disconnect,
}

// ─── Disconnect reasons for reconnection decision ────────────────────────────

enum DisconnectReason {
    UserRequested,
    NormalClose,
    Error(String),
}

// ─── Background task state ───────────────────────────────────────────────────

struct TaskState {
    config: WsConfig,
    event_tx: mpsc::Sender<WsEvent>,
    cmd_rx: mpsc::Receiver<Command>,
    reconnect_attempts: u32,
    state: Arc<AtomicU8>,
}

impl TaskState {
    /// Blocks while the consumer's event buffer is full, so no message is
    /// silently dropped.
    async fn emit(&self, event: WsEvent) {
        let _ = self.event_tx.send(event).await;
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn should_reconnect(&self) -> bool {
        self.config.reconnect && self.reconnect_attempts < self.config.max_reconnect_attempts
    }
}

// ─── Public WsClient ─────────────────────────────────────────────────────────

/// Native WebSocket client using `tokio-tungstenite`.
///
/// Uses a background tokio task for connection management.
/// The public API communicates with it via mpsc channels.
pub struct WsClient {
    config: WsConfig,
    cmd_tx: Option<mpsc::Sender<Command>>,
    event_rx: tokio::sync::Mutex<mpsc::Receiver<WsEvent>>,
    event_tx: mpsc::Sender<WsEvent>,
    task_handle: Option<JoinHandle<()>>,
    state: Arc<AtomicU8>,
}

impl WsClient {
    /// Create a new WS client. Does not connect yet.
    pub fn new(config: WsConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            config,
            cmd_tx: None,
            event_rx: tokio::sync::Mutex::new(event_rx),
            event_tx,
            task_handle: None,
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected as u8)),
        }
    }

    /// Connect to the device.
    ///
    /// Spawns a background task and returns immediately. Failures are never
    /// returned here: they surface as a `Closed` state plus `Error` and
    /// `Disconnected` events. Calling this while a task is alive is a no-op.
    ///
    /// Must run inside a tokio runtime; outside one the attempt fails the
    /// same way a refused connection does.
    pub fn connect(&mut self) {
        if self.task_handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                let err = WsError::ConnectionFailed(format!("no tokio runtime: {}", e));
                tracing::error!("WebSocket connect error: {}", err);
                self.cmd_tx = None;
                self.state.store(ConnectionState::Closed as u8, Ordering::SeqCst);
                let _ = self.event_tx.try_send(WsEvent::Error(err.to_string()));
                let _ = self.event_tx.try_send(WsEvent::Disconnected {
                    code: None,
                    reason: err.to_string(),
                });
                return;
            }
        };

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        self.cmd_tx = Some(cmd_tx);
        self.state.store(ConnectionState::Connecting as u8, Ordering::SeqCst);

        let state = TaskState {
            config: self.config.clone(),
            event_tx: self.event_tx.clone(),
            cmd_rx,
            reconnect_attempts: 0,
            state: Arc::clone(&self.state),
        };

        self.task_handle = Some(runtime.spawn(run_task(state)));
    }

    /// Close the connection and stop any reconnection.
    pub async fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(Command::Disconnect).await;
        }

        if let Some(mut handle) = self.task_handle.take() {
            if tokio::time::timeout(Duration::from_secs(5), &mut handle)
                .await
                .is_err()
            {
                tracing::warn!("WebSocket task did not stop in time, aborting");
                handle.abort();
            }
        }

        self.state.store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
    }

    /// Force a fresh connection attempt.
    pub async fn restart_connection(&mut self) {
        if self.connection_state() == ConnectionState::Connecting {
            tracing::info!("Already connecting, skipping restart");
            return;
        }

        tracing::info!("Manual reconnection requested");
        self.disconnect().await;
        self.connect();
    }

    /// Send a request to the device.
    ///
    /// Returns `WsError::NotConnected` unless the socket is open.
    pub fn send(&self, msg: MessageOut) -> Result<(), WsError> {
        if !self.is_connected() {
            tracing::warn!(
                "Cannot send message ({}) - WebSocket not open (state: {:?})",
                msg,
                self.connection_state()
            );
            return Err(WsError::NotConnected);
        }

        match &self.cmd_tx {
            Some(tx) => tx.try_send(Command::Send(msg)).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    WsError::SendFailed("Command channel full".into())
                }
                mpsc::error::TrySendError::Closed(_) => WsError::NotConnected,
            }),
            None => Err(WsError::NotConnected),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state().is_open()
    }

    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    /// Wait for the next event. `None` once the client is dropped.
    ///
    /// Unlike [`events`](Self::events), the borrow ends when the future
    /// resolves, so the caller can mutate its own state between events.
    pub async fn next_event(&self) -> Option<WsEvent> {
        self.event_rx.lock().await.recv().await
    }

    /// Get a stream of events from the WebSocket connection.
    ///
    /// The returned stream borrows `self`, so it must be dropped
    /// before calling `disconnect()`.
    pub fn events(&self) -> Pin<Box<dyn Stream<Item = WsEvent> + Send + '_>> {
        Box::pin(futures_util::stream::unfold(&self.event_rx, |rx| async move {
            let mut guard = rx.lock().await;
            guard.recv().await.map(|event| (event, rx))
        }))
    }
}

impl LogChannel for WsClient {
    fn send_message(&self, message: MessageOut) -> Result<(), WsError> {
        self.send(message)
    }

    fn connection_state(&self) -> ConnectionState {
        WsClient::connection_state(self)
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: TaskState) {
    loop {
        // ── 1. Attempt connection ────────────────────────────────────────
        state.set_state(ConnectionState::Connecting);
        let timeout = Duration::from_millis(state.config.connect_timeout_ms);
        let (sink, stream) = match attempt_connect(&state.config.url, timeout).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!("WebSocket connect error: {}", e);
                state.set_state(ConnectionState::Closed);
                state.emit(WsEvent::Error(e.to_string())).await;
                state
                    .emit(WsEvent::Disconnected {
                        code: None,
                        reason: e.to_string(),
                    })
                    .await;

                if state.should_reconnect() {
                    if backoff_sleep(&mut state).await {
                        continue;
                    }
                    return;
                }
                if state.config.reconnect {
                    state.emit(WsEvent::MaxReconnectReached).await;
                }
                return;
            }
        };

        // ── 2. Connected: resync before anything else ────────────────────
        let mut sink = sink;
        state.reconnect_attempts = 0;
        state.set_state(ConnectionState::Open);
        if let Err(e) = send_msg(&mut sink, &MessageOut::WholeLog).await {
            tracing::warn!("Failed to request whole log: {}", e);
        }
        tracing::info!("WebSocket connection established");
        state.emit(WsEvent::Connected).await;

        // ── 3. Inner select! loop ────────────────────────────────────────
        let reason = run_connected(&mut state, sink, stream).await;

        // ── 4. Post-disconnect decision ──────────────────────────────────
        match reason {
            DisconnectReason::UserRequested => {
                state.set_state(ConnectionState::Disconnected);
                return;
            }
            DisconnectReason::NormalClose => {
                state.set_state(ConnectionState::Closed);
                return;
            }
            DisconnectReason::Error(e) => {
                state.set_state(ConnectionState::Closed);
                if state.should_reconnect() {
                    tracing::info!("Connection lost ({}), reconnecting", e);
                    if backoff_sleep(&mut state).await {
                        continue;
                    }
                    return;
                }
                if state.config.reconnect {
                    state.emit(WsEvent::MaxReconnectReached).await;
                }
                return;
            }
        }
    }
}

/// The inner connected loop: runs until the connection breaks.
async fn run_connected(
    state: &mut TaskState,
    mut sink: SplitSink<WsStream, Message>,
    mut stream: SplitStream<WsStream>,
) -> DisconnectReason {
    loop {
        tokio::select! {
            // ── a) Incoming WS frame ─────────────────────────────────────
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text_str: &str = text.as_ref();
                        state.emit(WsEvent::from_text(text_str)).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = extract_close(frame.as_ref());
                        tracing::info!("WebSocket closed: code={}, reason={}", code, reason);
                        state.set_state(ConnectionState::Closed);
                        state.emit(WsEvent::Disconnected {
                            code: Some(code),
                            reason: reason.clone(),
                        }).await;
                        return match code {
                            1000 => DisconnectReason::NormalClose,
                            _ => DisconnectReason::Error(reason),
                        };
                    }
                    Some(Ok(_)) => {} // Binary, Pong, Frame
                    Some(Err(e)) => {
                        let reason = e.to_string();
                        tracing::error!("WebSocket error: {}", reason);
                        state.set_state(ConnectionState::Closed);
                        state.emit(WsEvent::Disconnected {
                            code: None,
                            reason: reason.clone(),
                        }).await;
                        return DisconnectReason::Error(reason);
                    }
                    None => {
                        state.set_state(ConnectionState::Closed);
                        state.emit(WsEvent::Disconnected {
                            code: None,
                            reason: "Stream ended".into(),
                        }).await;
                        return DisconnectReason::Error("Stream ended".into());
                    }
                }
            }

            // ── b) Command from public API ───────────────────────────────
            cmd = state.cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(msg_out)) => {
                        if let Err(e) = send_msg(&mut sink, &msg_out).await {
                            tracing::warn!("Send failed: {}", e);
                        }
                    }
                    Some(Command::Disconnect) | None => {
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "Client disconnect".into(),
                        }))).await;
                        return DisconnectReason::UserRequested;
                    }
                }
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn attempt_connect(
    url: &str,
    timeout: Duration,
) -> Result<(SplitSink<WsStream, Message>, SplitStream<WsStream>), WsError> {
    let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| WsError::ConnectionFailed(format!("timed out after {}ms", timeout.as_millis())))?
        .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

    Ok(ws_stream.split())
}

/// Serialize and send a MessageOut over the sink.
async fn send_msg(sink: &mut SplitSink<WsStream, Message>, msg: &MessageOut) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1006, "No close frame".into()),
    }
}

// ─── Reconnection backoff ────────────────────────────────────────────────────

/// `base * 2^(attempt-1)` plus jitter, capped at 60s.
fn backoff_delay_ms(attempt: u32, base_ms: u32, jitter_ms: u32) -> u32 {
    let exp = attempt.saturating_sub(1).min(10);
    base_ms
        .saturating_mul(1u32 << exp)
        .saturating_add(jitter_ms)
        .min(60_000)
}

/// Sleep before the next attempt. Returns `false` if the caller asked to
/// disconnect meanwhile. Sends issued during the wait were already rejected
/// by `WsClient::send`, so anything left in the channel is dropped.
async fn backoff_sleep(state: &mut TaskState) -> bool {
    state.reconnect_attempts += 1;
    state.set_state(ConnectionState::Connecting);

    let jitter = rand::random::<u32>() % 500;
    let delay = backoff_delay_ms(
        state.reconnect_attempts,
        state.config.base_reconnect_delay_ms,
        jitter,
    );

    tracing::info!(
        "Reconnect attempt {}/{} in {}ms",
        state.reconnect_attempts,
        state.config.max_reconnect_attempts,
        delay
    );

    let sleep = tokio::time::sleep(Duration::from_millis(delay as u64));
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return true,
            cmd = state.cmd_rx.recv() => match cmd {
                Some(Command::Send(msg)) => {
                    tracing::debug!("Dropping message sent while reconnecting: {}", msg);
                }
                Some(Command::Disconnect) | None => {
                    state.set_state(ConnectionState::Disconnected);
                    return false;
                }
            },
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
