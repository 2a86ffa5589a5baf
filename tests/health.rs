use anyhow::Result;

mod common;

#[tokio::test]
async fn test_health_endpoint_reports_liveness() -> Result<()> {
    let port = common::get_available_port();
    let settings = common::test_settings(port, &common::unreachable_api_url());

    let handle = tokio::spawn(async move { dash_exporter::exporter::new(settings).await });

    assert!(common::wait_for_server(port, 50).await);

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", common::get_test_url(port)))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    let x_app = response
        .headers()
        .get("X-App")
        .expect("X-App header should be present")
        .to_str()?
        .to_string();
    assert!(x_app.starts_with("dash_exporter:"));

    let health: serde_json::Value = response.json().await?;
    assert_eq!(health["name"], "dash_exporter");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
    assert!(health["collectors"].is_array());

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_health_options_returns_empty_body() -> Result<()> {
    let port = common::get_available_port();
    let settings = common::test_settings(port, &common::unreachable_api_url());

    let handle = tokio::spawn(async move { dash_exporter::exporter::new(settings).await });

    assert!(common::wait_for_server(port, 50).await);

    let client = reqwest::Client::new();
    let response = client
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/health", common::get_test_url(port)),
        )
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    assert!(response.text().await?.is_empty());

    handle.abort();

    Ok(())
}
