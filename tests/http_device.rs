//! Integration tests for the device HTTP endpoints against a loopback server.
//!
//! The server answers every request with the same canned HTTP/1.1 response
//! and records the request lines it saw.

#![cfg(feature = "http")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use energy_collector_client::client::CollectorClient;
use energy_collector_client::error::CollectorError;
use energy_collector_client::http::client::DEFAULT_LOG_FILE_NAME;
use energy_collector_client::http::RetryConfig;

type Requests = Arc<Mutex<Vec<String>>>;

async fn spawn_device(response: String) -> (String, Requests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests: Requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    tokio::spawn(async move {
        loop {
            let Ok((mut tcp, _)) = listener.accept().await else {
                return;
            };
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                match tcp.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
            }
            let head = String::from_utf8_lossy(&buf);
            if let Some(line) = head.lines().next() {
                seen.lock().unwrap().push(line.to_string());
            }
            let _ = tcp.write_all(response.as_bytes()).await;
            let _ = tcp.shutdown().await;
        }
    });

    (format!("http://{}", addr), requests)
}

fn response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {}\r\nConnection: close\r\nContent-Length: {}\r\n", status, body.len());
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str("\r\n");
    out.push_str(body);
    out
}

fn client(base_url: &str) -> CollectorClient {
    CollectorClient::builder().base_url(base_url).build().unwrap()
}

const CSV: &str = "time,accumulatedValue\n1700000000,1.5\n1700000060,2.5\n";

#[tokio::test]
async fn test_download_log_uses_disposition_file_name() {
    let (url, requests) = spawn_device(response(
        "200 OK",
        &[
            ("Content-Type", "text/csv"),
            ("Content-Disposition", r#"attachment; filename="pulses.csv""#),
        ],
        CSV,
    ))
    .await;

    let file = client(&url).device().download_log().await.unwrap();
    assert_eq!(file.file_name, "pulses.csv");
    assert_eq!(file.content_type.as_deref(), Some("text/csv"));
    assert_eq!(file.bytes, CSV.as_bytes());
    assert_eq!(*requests.lock().unwrap(), vec!["GET /download HTTP/1.1".to_string()]);
}

#[tokio::test]
async fn test_download_log_defaults_file_name() {
    let (url, _) = spawn_device(response("200 OK", &[], CSV)).await;

    let file = client(&url).device().download_log().await.unwrap();
    assert_eq!(file.file_name, DEFAULT_LOG_FILE_NAME);
    assert_eq!(file.len(), CSV.len());
}

#[tokio::test]
async fn test_download_log_not_found_is_not_retried() {
    let (url, requests) = spawn_device(response("404 Not Found", &[], "no log")).await;

    let result = client(&url).device().download_log().await;
    assert!(matches!(result, Err(CollectorError::DownloadFailed(_))));
    assert_eq!(requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_download_log_server_error_retries_then_fails() {
    let (url, requests) = spawn_device(response("500 Internal Server Error", &[], "sd card")).await;

    let result = client(&url).device().download_log().await;
    match result {
        Err(CollectorError::DownloadFailed(msg)) => assert!(msg.contains("sd card"), "got: {msg}"),
        other => panic!("expected DownloadFailed, got {other:?}"),
    }
    assert_eq!(requests.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_download_log_follows_custom_retry_schedule() {
    let (url, requests) = spawn_device(response("503 Service Unavailable", &[], "busy")).await;

    let client = CollectorClient::builder()
        .base_url(&url)
        .download_retry(RetryConfig {
            max_retries: 1,
            initial_delay: Duration::from_millis(10),
            jitter: false,
            ..RetryConfig::idempotent()
        })
        .build()
        .unwrap();

    let result = client.device().download_log().await;
    assert!(matches!(result, Err(CollectorError::DownloadFailed(_))));
    assert_eq!(requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_enter_config_mode_acknowledges_transport_drop() {
    let (url, requests) = spawn_device(response("200 OK", &[], "Entering config mode")).await;

    let ack = client(&url).device().enter_config_mode().await.unwrap();
    assert_eq!(ack.message, "Entering config mode");
    assert!(ack.transport_may_drop);
    assert_eq!(*requests.lock().unwrap(), vec!["POST /configMode HTTP/1.1".to_string()]);
}

#[tokio::test]
async fn test_config_mode_failure_is_isolated_and_not_retried() {
    let (url, requests) = spawn_device(response("503 Service Unavailable", &[], "busy")).await;

    let result = client(&url).device().enter_config_mode().await;
    assert!(matches!(result, Err(CollectorError::ConfigModeFailed(_))));
    assert_eq!(requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reset_network_config_posts_reset() {
    let (url, requests) = spawn_device(response("200 OK", &[], "")).await;

    let ack = client(&url).device().reset_network_config().await.unwrap();
    assert!(ack.message.is_empty());
    assert_eq!(*requests.lock().unwrap(), vec!["POST /resetConfig HTTP/1.1".to_string()]);
}

#[tokio::test]
async fn test_unreachable_device_reports_download_failed() {
    let result = client("http://127.0.0.1:1").device().download_log().await;
    assert!(matches!(result, Err(CollectorError::DownloadFailed(_))));
}
