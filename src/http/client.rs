//! Low-level HTTP client: `CollectorHttp`.
//!
//! One method per device endpoint. These calls never go over the socket and
//! never touch the series; the session layer maps their errors onto
//! user-facing conditions.

use crate::domain::device::LogFile;
use crate::error::HttpError;
use crate::http::retry::{RetryConfig, RetryPolicy};
use crate::network::{CONFIG_MODE_PATH, DOWNLOAD_PATH, RESET_CONFIG_PATH};

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::time::Duration;

/// File name used when the device omits `Content-Disposition`.
pub const DEFAULT_LOG_FILE_NAME: &str = "datalog.csv";

/// Low-level HTTP client for the collector's auxiliary endpoints.
#[derive(Clone)]
pub struct CollectorHttp {
    base_url: String,
    client: Client,
    download_retry: RetryPolicy,
}

impl CollectorHttp {
    pub fn new(base_url: &str) -> Result<Self, HttpError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// The timeout only applies on native targets; the browser owns it on WASM.
    #[cfg_attr(target_arch = "wasm32", allow(unused_variables))]
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, HttpError> {
        #[allow(unused_mut)]
        let mut builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        {
            builder = builder.timeout(timeout).pool_max_idle_per_host(2);
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: builder.build()?,
            download_retry: RetryPolicy::Idempotent,
        })
    }

    /// Replace the retry schedule of [`download_log`](Self::download_log).
    pub fn with_download_retry(mut self, config: RetryConfig) -> Self {
        self.download_retry = RetryPolicy::Custom(config);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Log ──────────────────────────────────────────────────────────────

    /// Fetch the persisted log file as an opaque artifact.
    pub async fn download_log(&self) -> Result<LogFile, HttpError> {
        let url = format!("{}{}", self.base_url, DOWNLOAD_PATH);
        let resp = self
            .request_with_retry(reqwest::Method::GET, &url, self.download_retry.clone())
            .await?;

        let content_type = header_str(&resp, CONTENT_TYPE.as_str());
        let file_name = header_str(&resp, CONTENT_DISPOSITION.as_str())
            .and_then(|v| file_name_from_disposition(&v))
            .unwrap_or_else(|| DEFAULT_LOG_FILE_NAME.to_string());
        let bytes = resp.bytes().await?.to_vec();

        tracing::info!("Downloaded log file {} ({} bytes)", file_name, bytes.len());
        Ok(LogFile {
            file_name,
            content_type,
            bytes,
        })
    }

    // ── Device configuration ─────────────────────────────────────────────

    /// Ask the device to switch into network configuration mode.
    ///
    /// Not idempotent from the device's point of view, so never retried.
    pub async fn enter_config_mode(&self) -> Result<String, HttpError> {
        let url = format!("{}{}", self.base_url, CONFIG_MODE_PATH);
        let resp = self
            .request_with_retry(reqwest::Method::POST, &url, RetryPolicy::None)
            .await?;
        Ok(response_text(resp).await)
    }

    /// Wipe the stored Wi-Fi credentials on the device.
    pub async fn reset_network_config(&self) -> Result<String, HttpError> {
        let url = format!("{}{}", self.base_url, RESET_CONFIG_PATH);
        let resp = self
            .request_with_retry(reqwest::Method::POST, &url, RetryPolicy::None)
            .await?;
        Ok(response_text(resp).await)
    }

    // ── Internal HTTP methods ────────────────────────────────────────────

    async fn request_with_retry(
        &self,
        method: reqwest::Method,
        url: &str,
        retry: RetryPolicy,
    ) -> Result<Response, HttpError> {
        let config = match &retry {
            RetryPolicy::None => {
                return self.do_request(&method, url).await;
            }
            RetryPolicy::Idempotent => RetryConfig::idempotent(),
            RetryPolicy::Custom(c) => c.clone(),
        };

        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match self.do_request(&method, url).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let should_retry = match &e {
                        HttpError::ServerError { status, .. } => {
                            config.retryable_statuses.contains(status)
                        }
                        HttpError::RateLimited { retry_after_ms } => {
                            if let Some(ms) = retry_after_ms {
                                futures_timer::Delay::new(Duration::from_millis(*ms)).await;
                            }
                            true
                        }
                        HttpError::Timeout => true,
                        HttpError::Reqwest(re) => {
                            #[cfg(not(target_arch = "wasm32"))]
                            let retryable = re.is_connect() || re.is_timeout() || re.is_request();
                            #[cfg(target_arch = "wasm32")]
                            let retryable = re.is_timeout() || re.is_request();
                            retryable
                        }
                        _ => false,
                    };

                    if should_retry && attempt < config.max_retries {
                        let delay = config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max = config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying request to {}",
                            url
                        );
                        futures_timer::Delay::new(delay).await;
                        last_error = Some(e);
                    } else if should_retry {
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(HttpError::MaxRetriesExceeded {
            attempts: config.max_retries + 1,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn do_request(&self, method: &reqwest::Method, url: &str) -> Result<Response, HttpError> {
        let resp = self.client.request(method.clone(), url).send().await?;
        let status = resp.status();

        if status.is_success() {
            return Ok(resp);
        }

        let status_code = status.as_u16();
        let retry_after_ms = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body_text = resp.text().await.unwrap_or_default();

        match status_code {
            404 => Err(HttpError::NotFound(body_text)),
            408 => Err(HttpError::Timeout),
            429 => Err(HttpError::RateLimited { retry_after_ms }),
            400..=499 => Err(HttpError::BadRequest(body_text)),
            _ => Err(HttpError::ServerError {
                status: status_code,
                body: body_text,
            }),
        }
    }
}

/// Body of a successful acknowledgement. An unreadable body is logged and
/// treated as empty: the device has already acted on the request.
async fn response_text(resp: Response) -> String {
    match resp.text().await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Discarding unreadable response body: {}", e);
            String::new()
        }
    }
}

fn header_str(resp: &Response, name: &str) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Extract `filename` from a `Content-Disposition` header value.
fn file_name_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
