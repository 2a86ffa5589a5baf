use anyhow::Result;

mod common;

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() -> Result<()> {
    let port = common::get_available_port();
    let settings = common::test_settings(port, &common::unreachable_api_url());

    let handle = tokio::spawn(async move { dash_exporter::exporter::new(settings).await });

    assert!(common::wait_for_server(port, 50).await);

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/metrics", common::get_test_url(port)))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    let content_type = response
        .headers()
        .get("content-type")
        .expect("Content-Type header should be present");
    assert_eq!(content_type, "text/plain; charset=utf-8");

    let body = response.text().await?;

    assert!(body.contains("# HELP"));
    assert!(body.contains("# TYPE"));

    // The first tick records a pass duration even when the API is down.
    let body = common::wait_for_metric(port, "dash_exporter_collector_duration_seconds", 50)
        .await
        .expect("run stats should appear after the first tick");
    assert!(body.contains("dash_exporter_collector_duration_seconds"));

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_scrape_succeeds_while_api_is_unreachable() -> Result<()> {
    let port = common::get_available_port();
    let settings = common::test_settings(port, &common::unreachable_api_url());

    let handle = tokio::spawn(async move { dash_exporter::exporter::new(settings).await });

    assert!(common::wait_for_server(port, 50).await);

    // The first tick fails against the dead API; the scrape must still be a
    // clean 200 and the failure must surface as error counters instead.
    let body = common::wait_for_metric(port, "dash_exporter_collector_errors_total", 50)
        .await
        .expect("error counters should appear after the first failed tick");

    assert!(body.contains("dash_exporter_collector_errors_total"));

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/metrics", common::get_test_url(port)))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_cardinality_endpoint_reports_families() -> Result<()> {
    let port = common::get_available_port();
    let settings = common::test_settings(port, &common::unreachable_api_url());

    let handle = tokio::spawn(async move { dash_exporter::exporter::new(settings).await });

    assert!(common::wait_for_server(port, 50).await);

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/cardinality", common::get_test_url(port)))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    let report: serde_json::Value = response.json().await?;
    assert!(report.get("total_series").is_some());
    assert!(report["families"].is_array());

    handle.abort();

    Ok(())
}
