//! WASM WebSocket client using `web-sys::WebSocket`.
//!
//! - `web-sys::WebSocket` + `wasm-bindgen` closures
//! - Whole-log request on every open
//! - Optional exponential backoff reconnection
//! - Callback-based event system (`on_event: impl Fn(WsEvent)`)

use std::cell::RefCell;

use gloo_timers::callback::Timeout;
use wasm_bindgen::prelude::*;
use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

use crate::error::WsError;
use crate::ws::{ConnectionState, LogChannel, MessageOut, WsConfig, WsEvent};

thread_local! {
    static WS: RefCell<Option<WebSocket>> = RefCell::new(None);
    static CONFIG: RefCell<Option<WsConfig>> = RefCell::new(None);
    static ON_EVENT: RefCell<Option<Box<dyn Fn(WsEvent)>>> = RefCell::new(None);
    static STATE: RefCell<ConnectionState> = RefCell::new(ConnectionState::Disconnected);
    static RECONNECT_TIMEOUT: RefCell<Option<Timeout>> = RefCell::new(None);
    static RECONNECT_ATTEMPTS: RefCell<u32> = RefCell::new(0);
}

/// WASM WebSocket client: unit struct with static methods.
///
/// All state lives in `thread_local!` statics (WASM is single-threaded).
/// The consumer provides an `on_event` callback that receives `WsEvent`s
/// for connection lifecycle and incoming messages. The callback must not
/// call back into `connect` or `cleanup`.
pub struct WsClient;

impl WsClient {
    /// Initialize and connect the WebSocket.
    pub fn connect(config: WsConfig, on_event: impl Fn(WsEvent) + 'static) {
        CONFIG.with(|c| *c.borrow_mut() = Some(config));
        ON_EVENT.with(|cb| *cb.borrow_mut() = Some(Box::new(on_event)));
        RECONNECT_ATTEMPTS.with(|a| *a.borrow_mut() = 0);
        Self::do_connect();
    }

    /// Send a request. Rejected with `WsError::NotConnected` unless open.
    pub fn send(message: MessageOut) -> Result<(), WsError> {
        WS.with(|ws| match ws.try_borrow() {
            Err(e) => Err(WsError::SendFailed(format!("WebSocket borrow failed: {}", e))),
            Ok(ws_ref) => match ws_ref.as_ref() {
                Some(w) if Self::connection_state().is_open() => {
                    w.send_with_str(&message.to_string()).map_err(|e| {
                        let msg = extract_js_error(&e);
                        tracing::error!("Failed to send message ({}): {}", message, msg);
                        WsError::SendFailed(msg)
                    })
                }
                _ => {
                    tracing::warn!(
                        "Cannot send message ({}) - WebSocket not open (state: {:?})",
                        message,
                        Self::connection_state()
                    );
                    Err(WsError::NotConnected)
                }
            },
        })
    }

    /// Force a fresh connection attempt.
    pub fn restart_connection() {
        if Self::connection_state() == ConnectionState::Connecting {
            tracing::info!("Already connecting, skipping restart");
            return;
        }

        tracing::info!("Manual reconnection requested");
        Self::cleanup_connection();
        Self::cancel_reconnect();
        RECONNECT_ATTEMPTS.with(|a| {
            let _ = a.try_borrow_mut().map(|mut v| *v = 0);
        });

        Self::do_connect();
    }

    pub fn is_connected() -> bool {
        Self::connection_state().is_open()
    }

    pub fn connection_state() -> ConnectionState {
        STATE.with(|s| s.try_borrow().map(|s| *s).unwrap_or(ConnectionState::Closed))
    }

    /// Close the socket, stop reconnecting and drop the callback.
    pub fn cleanup() {
        Self::cleanup_connection();
        Self::cancel_reconnect();
        Self::set_state(ConnectionState::Disconnected);
        ON_EVENT.with(|cb| *cb.borrow_mut() = None);
        CONFIG.with(|c| *c.borrow_mut() = None);
    }

    // ── Internal ──────────────────────────────────────────────────────────

    fn emit(event: WsEvent) {
        ON_EVENT.with(|cb| {
            if let Ok(cb_ref) = cb.try_borrow() {
                if let Some(f) = cb_ref.as_ref() {
                    f(event);
                }
            }
        });
    }

    fn set_state(state: ConnectionState) {
        STATE.with(|s| {
            let _ = s.try_borrow_mut().map(|mut v| *v = state);
        });
    }

    fn get_config_val<T>(f: impl Fn(&WsConfig) -> T, default: T) -> T {
        CONFIG.with(|c| c.borrow().as_ref().map(&f).unwrap_or(default))
    }

    fn do_connect() {
        match Self::connection_state() {
            ConnectionState::Connecting | ConnectionState::Open => {
                tracing::info!("Already connected or connecting, skipping");
                return;
            }
            _ => {}
        }

        let default_url = crate::network::ws_url_for_host(crate::network::DEFAULT_DEVICE_HOST);
        let url = Self::get_config_val(|c| c.url.clone(), default_url);
        tracing::info!("Creating WebSocket connection to {}", url);
        Self::set_state(ConnectionState::Connecting);

        match WebSocket::new(&url) {
            Err(err) => {
                let err = WsError::ConnectionFailed(extract_js_error(&err));
                tracing::error!("Failed to create WebSocket: {}", err);
                Self::set_state(ConnectionState::Closed);
                Self::emit(WsEvent::Error(err.to_string()));
                Self::emit(WsEvent::Disconnected {
                    code: None,
                    reason: err.to_string(),
                });
                Self::schedule_reconnect();
            }
            Ok(ws) => Self::setup_connection(ws),
        }
    }

    fn setup_connection(ws: WebSocket) {
        let onopen = Closure::<dyn FnMut()>::new(move || {
            tracing::info!("WebSocket opened");

            Self::cancel_reconnect();
            RECONNECT_ATTEMPTS.with(|a| {
                let _ = a.try_borrow_mut().map(|mut v| *v = 0);
            });
            Self::set_state(ConnectionState::Open);

            if let Err(e) = Self::send(MessageOut::WholeLog) {
                tracing::warn!("Failed to request whole log: {}", e);
            }
            Self::emit(WsEvent::Connected);
        });
        ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();

        let onmessage = Closure::<dyn FnMut(_)>::new(move |e: MessageEvent| {
            if let Ok(txt) = e.data().dyn_into::<js_sys::JsString>() {
                let txt: String = txt.into();
                Self::emit(WsEvent::from_text(&txt));
            }
        });
        ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();

        let onerror = Closure::<dyn FnMut(_)>::new(move |e: ErrorEvent| {
            let msg = extract_js_error(&e.error());
            tracing::error!("WebSocket error: {:?}", msg);
            Self::emit(WsEvent::Error(msg));
        });
        ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();

        let onclose = Closure::<dyn FnMut(_)>::new(move |e: CloseEvent| {
            let close_code = e.code();
            let reason = e.reason();
            tracing::info!("WebSocket closed: code={}, reason={}", close_code, reason);

            Self::cleanup_connection();
            Self::set_state(ConnectionState::Closed);
            Self::emit(WsEvent::Disconnected {
                code: Some(close_code),
                reason,
            });

            if close_code != 1000 {
                Self::schedule_reconnect();
            }
        });
        ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();

        WS.with(|ws_cell| {
            if let Ok(mut ws_ref) = ws_cell.try_borrow_mut() {
                *ws_ref = Some(ws);
            } else {
                tracing::error!("Could not store WebSocket - cell already borrowed");
            }
        });
    }

    // ── Reconnection ──────────────────────────────────────────────────────

    fn schedule_reconnect() {
        if !Self::get_config_val(|c| c.reconnect, false) {
            return;
        }

        let already_scheduled = RECONNECT_TIMEOUT.with(|t| t.borrow().is_some());
        if already_scheduled {
            tracing::info!("Reconnect already scheduled, skipping");
            return;
        }

        let attempt = RECONNECT_ATTEMPTS.with(|a| {
            let mut a = a.borrow_mut();
            *a += 1;
            *a
        });

        let max_attempts = Self::get_config_val(|c| c.max_reconnect_attempts, 10);
        if attempt > max_attempts {
            tracing::warn!("Max reconnection attempts ({}) exceeded", max_attempts);
            Self::emit(WsEvent::MaxReconnectReached);
            return;
        }

        let base = Self::get_config_val(|c| c.base_reconnect_delay_ms, 1_000);
        let jitter = (js_sys::Math::random() * 500.0) as u32;
        let exp = attempt.saturating_sub(1).min(10);
        let delay = base
            .saturating_mul(1u32 << exp)
            .saturating_add(jitter)
            .min(60_000);

        tracing::info!("Scheduling reconnect attempt {} in {}ms", attempt, delay);

        RECONNECT_TIMEOUT.with(|timeout| {
            *timeout.borrow_mut() = Some(Timeout::new(delay, || {
                tracing::info!("Reconnect timeout fired");
                RECONNECT_TIMEOUT.with(|t| {
                    // Must not drop the closure that is currently running.
                    if let Some(handle) = t.borrow_mut().take() {
                        handle.forget();
                    }
                });
                WsClient::do_connect();
            }));
        });
    }

    fn cancel_reconnect() {
        RECONNECT_TIMEOUT.with(|timeout| {
            if let Ok(mut timeout_ref) = timeout.try_borrow_mut() {
                if let Some(handle) = timeout_ref.take() {
                    handle.cancel();
                }
            }
        });
    }

    // ── Connection cleanup ────────────────────────────────────────────────

    fn cleanup_connection() {
        WS.with(|ws| {
            if let Ok(mut ws_ref) = ws.try_borrow_mut() {
                if let Some(w) = ws_ref.take() {
                    w.set_onopen(None);
                    w.set_onmessage(None);
                    w.set_onerror(None);
                    w.set_onclose(None);

                    if ConnectionState::from_ready_state(w.ready_state()).is_open() {
                        let _ = w.close_with_code(1000);
                    }
                }
            }
        });
    }
}

/// Handle for code that is generic over [`LogChannel`].
impl LogChannel for WsClient {
    fn send_message(&self, message: MessageOut) -> Result<(), WsError> {
        WsClient::send(message)
    }

    fn connection_state(&self) -> ConnectionState {
        WsClient::connection_state()
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn extract_js_error(err: &JsValue) -> String {
    if let Some(error) = err.dyn_ref::<js_sys::Error>() {
        let name = error.name().as_string().unwrap_or_else(|| "Error".to_string());
        let message = error.message().as_string().unwrap_or_default();

        return if message.is_empty() {
            name
        } else {
            format!("{}: {}", name, message)
        };
    }

    if let Ok(json_str) = js_sys::JSON::stringify(err) {
        if let Some(s) = json_str.as_string() {
            if !s.is_empty() && s != "null" && s != "undefined" {
                return s;
            }
        }
    }

    if let Some(s) = err.as_string() {
        if !s.is_empty() {
            return s;
        }
    }

    if err.is_undefined() {
        return "undefined error".to_string();
    }

    if err.is_null() {
        return "null error".to_string();
    }

    "Unknown WebSocket error".to_string()
}
