#![allow(dead_code)]

use axum::{Json, Router, routing::get};
use dash_exporter::api::ApiSettings;
use dash_exporter::collectors::config::TierIntervals;
use dash_exporter::exporter::{ExporterSettings, WebhookSettings};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::time::Duration;

/// Find an available port for testing (returns port > 1024)
pub fn get_available_port() -> u16 {
    use std::net::TcpListener;

    // Bind to port 0 lets the OS assign an available ephemeral port
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
    let port = listener
        .local_addr()
        .expect("Failed to get local addr")
        .port();

    assert!(port > 1024, "Assigned port {} should be > 1024", port);

    port
}

/// Wait for server to be ready on the given port
pub async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    use tokio::time::sleep;

    for attempt in 1..=max_attempts {
        if tokio::net::TcpStream::connect(format!("localhost:{}", port))
            .await
            .is_ok()
        {
            return true;
        }

        if attempt % 10 == 0 {
            eprintln!(
                "Still waiting for server on port {} (attempt {}/{})",
                port, attempt, max_attempts
            );
        }

        sleep(Duration::from_millis(100)).await;
    }

    false
}

/// Get base URL for test server
pub fn get_test_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}

/// Poll /metrics until the body contains `needle` or the attempts run out.
pub async fn wait_for_metric(port: u16, needle: &str, max_attempts: u32) -> Option<String> {
    let client = reqwest::Client::new();
    for _ in 0..max_attempts {
        if let Ok(response) = client
            .get(format!("{}/metrics", get_test_url(port)))
            .send()
            .await
            && let Ok(body) = response.text().await
            && body.contains(needle)
        {
            return Some(body);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    None
}

/// An address nothing listens on: collection fails fast, serving continues.
pub fn unreachable_api_url() -> String {
    "http://127.0.0.1:9/api/v1".to_string()
}

pub fn test_settings(port: u16, api_url: &str) -> ExporterSettings {
    ExporterSettings {
        port,
        listen: None,
        api: ApiSettings {
            base_url: api_url.to_string(),
            key: SecretString::from("test-key"),
            timeout: Duration::from_secs(2),
            max_concurrent_requests: Some(4),
        },
        organizations: Vec::new(),
        collectors: vec![
            "devices".to_string(),
            "uplinks".to_string(),
            "networks".to_string(),
            "clients".to_string(),
            "organization".to_string(),
        ],
        intervals: TierIntervals::new(60, 300, 900).expect("valid intervals"),
        collector_timeout: Duration::from_secs(10),
        client_ttl: Duration::from_secs(3600),
        discovery_ttl: Duration::from_secs(3600),
        webhook: WebhookSettings::default(),
    }
}

async fn organizations() -> Json<Value> {
    Json(json!([{"id": "O1", "name": "test-org"}]))
}

async fn networks() -> Json<Value> {
    Json(json!([{"id": "N1", "name": "branch", "organizationId": "O1"}]))
}

async fn devices() -> Json<Value> {
    Json(json!([{
        "serial": "Q2XX-AAAA-BBBB",
        "name": "lobby-ap",
        "model": "AP-200",
        "networkId": "N1",
        "firmware": "29.1"
    }]))
}

async fn device_statuses() -> Json<Value> {
    Json(json!([{
        "serial": "Q2XX-AAAA-BBBB",
        "status": "online",
        "networkId": "N1",
        "lastReportedAt": "2026-01-01T00:00:00Z"
    }]))
}

async fn uplink_statuses() -> Json<Value> {
    Json(json!([{
        "serial": "Q2XX-AAAA-BBBB",
        "networkId": "N1",
        "uplinks": [{"interface": "wan1", "status": "active", "ip": "198.51.100.2"}]
    }]))
}

async fn loss_latency() -> Json<Value> {
    Json(json!([{
        "serial": "Q2XX-AAAA-BBBB",
        "uplink": "wan1",
        "timeSeries": [{"lossPercent": 0.0, "latencyMs": 18.5}]
    }]))
}

async fn clients() -> Json<Value> {
    Json(json!([{
        "id": "c1",
        "mac": "aa:bb:cc:00:00:01",
        "ip": "10.0.0.1",
        "vlan": 10,
        "usage": {"sent": 125.0, "recv": 840.5}
    }]))
}

async fn license_overview() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "expirationDate": "2027-03-15",
        "licensedDeviceCounts": {"wireless": 5}
    }))
}

/// Spawn a canned dashboard API on an ephemeral port; returns its base URL.
pub async fn spawn_fake_dashboard() -> String {
    let router = Router::new()
        .route("/api/v1/organizations", get(organizations))
        .route("/api/v1/organizations/O1/networks", get(networks))
        .route("/api/v1/organizations/O1/devices", get(devices))
        .route("/api/v1/organizations/O1/devices/statuses", get(device_statuses))
        .route("/api/v1/organizations/O1/uplinks/statuses", get(uplink_statuses))
        .route(
            "/api/v1/organizations/O1/devices/uplinks/lossAndLatency",
            get(loss_latency),
        )
        .route("/api/v1/networks/N1/clients", get(clients))
        .route("/api/v1/organizations/O1/licenses/overview", get(license_overview));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake dashboard");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.ok();
    });

    format!("http://{addr}/api/v1")
}
