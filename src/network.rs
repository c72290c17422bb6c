//! Device address constants and URL helpers.
//!
//! The collector hosts both the page and the socket, so every URL is derived
//! from a single host (`hostname[:port]`).

/// Address of the ESP32 while it runs its own access point.
pub const DEFAULT_DEVICE_HOST: &str = "192.168.4.1";

/// WebSocket endpoint path.
pub const WS_PATH: &str = "/ws";

/// Persisted log file download.
pub const DOWNLOAD_PATH: &str = "/download";

/// Switch the device into network configuration mode.
pub const CONFIG_MODE_PATH: &str = "/configMode";

/// Wipe stored Wi-Fi credentials.
pub const RESET_CONFIG_PATH: &str = "/resetConfig";

/// `ws://<host>/ws`
pub fn ws_url_for_host(host: &str) -> String {
    format!("ws://{}{}", trim_host(host), WS_PATH)
}

/// `http://<host>`
pub fn http_url_for_host(host: &str) -> String {
    format!("http://{}", trim_host(host))
}

fn trim_host(host: &str) -> &str {
    let host = host
        .strip_prefix("http://")
        .or_else(|| host.strip_prefix("ws://"))
        .unwrap_or(host);
    host.trim_end_matches('/')
}
