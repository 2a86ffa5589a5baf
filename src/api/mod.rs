//! Dashboard API client.
//!
//! Thin typed wrapper over the vendor's REST API: bearer auth, cursor
//! pagination via the `Link` header, and an optional global semaphore that
//! bounds concurrent requests across all collectors (the vendor rate-limits
//! per organization, so the ceiling is shared, not per collector).

use prometheus::CounterVec;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::warn;
use url::Url;

pub mod error;
pub mod types;

use error::ApiError;
use types::{
    Device, DeviceStatus, LicenseOverview, Network, NetworkClient, Organization,
    UplinkLossLatency, UplinkStatus,
};

/// Hard stop for runaway pagination; the vendor caps real result sets well
/// below this.
const MAX_PAGES: usize = 500;

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub key: SecretString,
    pub timeout: Duration,
    /// Global ceiling on in-flight requests; `None` disables the limiter.
    pub max_concurrent_requests: Option<usize>,
}

/// Records every outbound API call as `{call, outcome}` on a counter owned by
/// the run-stats registry.
#[derive(Clone)]
pub struct ApiCallRecorder {
    requests: CounterVec,
}

impl ApiCallRecorder {
    pub fn new(requests: CounterVec) -> Self {
        Self { requests }
    }

    pub fn record(&self, call: &str, outcome: &str) {
        self.requests.with_label_values(&[call, outcome]).inc();
    }
}

pub struct DashboardApi {
    http: reqwest::Client,
    base: Url,
    key: SecretString,
    limiter: Option<Arc<Semaphore>>,
    calls: ApiCallRecorder,
}

impl DashboardApi {
    pub fn new(settings: &ApiSettings, calls: ApiCallRecorder) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("dash_exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Url::join treats the last path segment as a file unless the base
        // ends with a slash.
        let mut base_url = settings.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base = Url::parse(&base_url)?;

        let limiter = settings
            .max_concurrent_requests
            .filter(|&n| n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));

        Ok(Self {
            http,
            base,
            key: settings.key.clone(),
            limiter,
            calls,
        })
    }

    pub async fn organizations(&self) -> Result<Vec<Organization>, ApiError> {
        self.get_paginated("organizations", "organizations", &[]).await
    }

    pub async fn networks(&self, org_id: &str) -> Result<Vec<Network>, ApiError> {
        self.get_paginated("networks", &format!("organizations/{org_id}/networks"), &[])
            .await
    }

    pub async fn devices(&self, org_id: &str) -> Result<Vec<Device>, ApiError> {
        self.get_paginated("devices", &format!("organizations/{org_id}/devices"), &[])
            .await
    }

    pub async fn device_statuses(&self, org_id: &str) -> Result<Vec<DeviceStatus>, ApiError> {
        self.get_paginated(
            "device_statuses",
            &format!("organizations/{org_id}/devices/statuses"),
            &[],
        )
        .await
    }

    pub async fn uplink_statuses(&self, org_id: &str) -> Result<Vec<UplinkStatus>, ApiError> {
        self.get_paginated(
            "uplink_statuses",
            &format!("organizations/{org_id}/uplinks/statuses"),
            &[],
        )
        .await
    }

    /// Loss/latency probes over the last two minutes, one series per uplink.
    pub async fn uplink_loss_latency(
        &self,
        org_id: &str,
    ) -> Result<Vec<UplinkLossLatency>, ApiError> {
        self.get_paginated(
            "uplink_loss_latency",
            &format!("organizations/{org_id}/devices/uplinks/lossAndLatency"),
            &[("timespan", "120")],
        )
        .await
    }

    pub async fn network_clients(&self, network_id: &str) -> Result<Vec<NetworkClient>, ApiError> {
        self.get_paginated(
            "network_clients",
            &format!("networks/{network_id}/clients"),
            &[("timespan", "300")],
        )
        .await
    }

    pub async fn license_overview(&self, org_id: &str) -> Result<LicenseOverview, ApiError> {
        let url = self.url(&format!("organizations/{org_id}/licenses/overview"), &[])?;
        let (overview, _) = self.request("license_overview", url).await?;
        Ok(overview)
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| ApiError::Validation(format!("bad request path {path:?}: {e}")))?;
        for (k, v) in query {
            url.query_pairs_mut().append_pair(k, v);
        }
        Ok(url)
    }

    async fn get_paginated<T: DeserializeOwned>(
        &self,
        call: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ApiError> {
        let mut first = self.url(path, query)?;
        first.query_pairs_mut().append_pair("perPage", "1000");

        let mut out = Vec::new();
        let mut next = Some(first);
        let mut pages = 0usize;

        while let Some(url) = next {
            let (mut batch, link): (Vec<T>, Option<Url>) = self.request(call, url).await?;
            out.append(&mut batch);
            next = link;

            pages += 1;
            if pages >= MAX_PAGES {
                warn!(call, pages, "pagination stopped at page cap");
                break;
            }
        }

        Ok(out)
    }

    /// One HTTP round trip: permit, status mapping, decode, next-page link.
    async fn request<T: DeserializeOwned>(
        &self,
        call: &'static str,
        url: Url,
    ) -> Result<(T, Option<Url>), ApiError> {
        let _permit = match &self.limiter {
            Some(sem) => sem.acquire().await.ok(),
            None => None,
        };

        let response = match self
            .http
            .get(url)
            .bearer_auth(self.key.expose_secret())
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let err = ApiError::from(err);
                self.calls.record(call, err.kind().as_str());
                return Err(err);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok());
            let err = classify_status(status.as_u16(), retry_after);
            self.calls.record(call, err.kind().as_str());
            return Err(err);
        }

        let next = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link)
            .and_then(|raw| Url::parse(&raw).ok());

        match response.json::<T>().await {
            Ok(body) => {
                self.calls.record(call, "success");
                Ok((body, next))
            }
            Err(err) => {
                let err = ApiError::Validation(err.to_string());
                self.calls.record(call, err.kind().as_str());
                Err(err)
            }
        }
    }
}

fn classify_status(status: u16, retry_after: Option<u64>) -> ApiError {
    match status {
        429 => ApiError::RateLimited { retry_after },
        400 | 404 => ApiError::NotAvailable { status },
        500..=599 => ApiError::Server { status },
        _ => ApiError::Client { status },
    }
}

/// Extract the `rel=next` target from a `Link` header, if any.
fn parse_next_link(header: &str) -> Option<String> {
    for part in header.split(',') {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces
            .any(|p| matches!(p.trim(), "rel=next" | "rel=\"next\"" | "rel='next'"));
        if is_next && target.starts_with('<') && target.ends_with('>') {
            return Some(target[1..target.len() - 1].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        extract::Query,
        http::{HeaderMap, StatusCode, header},
        response::IntoResponse,
        routing::get,
    };
    use prometheus::Opts;
    use std::collections::HashMap;

    fn recorder() -> (ApiCallRecorder, CounterVec) {
        let requests = CounterVec::new(
            Opts::new("test_api_requests_total", "test"),
            &["call", "outcome"],
        )
        .unwrap();
        (ApiCallRecorder::new(requests.clone()), requests)
    }

    fn api_for(addr: std::net::SocketAddr, calls: ApiCallRecorder) -> DashboardApi {
        let settings = ApiSettings {
            base_url: format!("http://{addr}/api/v1"),
            key: SecretString::from("test-key"),
            timeout: Duration::from_secs(2),
            max_concurrent_requests: Some(4),
        };
        DashboardApi::new(&settings, calls).unwrap()
    }

    async fn serve(router: Router) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service()).await.ok();
        });
        addr
    }

    #[test]
    fn test_parse_next_link() {
        let header = r#"<https://api.example.com/api/v1/organizations?perPage=1000&startingAfter=abc>; rel="next", <https://api.example.com/api/v1/organizations?perPage=1000>; rel="first""#;
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://api.example.com/api/v1/organizations?perPage=1000&startingAfter=abc")
        );
        assert_eq!(parse_next_link(r#"<https://x>; rel="prev""#), None);
        assert_eq!(parse_next_link(""), None);
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(429, Some(3)),
            ApiError::RateLimited { retry_after: Some(3) }
        ));
        assert!(matches!(classify_status(404, None), ApiError::NotAvailable { status: 404 }));
        assert!(matches!(classify_status(400, None), ApiError::NotAvailable { status: 400 }));
        assert!(matches!(classify_status(403, None), ApiError::Client { status: 403 }));
        assert!(matches!(classify_status(502, None), ApiError::Server { status: 502 }));
    }

    // Two pages: the first carries a rel=next link, the second does not.
    async fn paged_orgs(
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> impl IntoResponse {
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost")
            .to_string();

        let mut out = HeaderMap::new();
        out.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());

        if params.contains_key("startingAfter") {
            (out, r#"[{"id":"3","name":"gamma"}]"#)
        } else {
            let link = format!(
                "<http://{host}/api/v1/organizations?perPage=1000&startingAfter=2>; rel=\"next\""
            );
            out.insert("link", link.parse().unwrap());
            (out, r#"[{"id":"1","name":"alpha"},{"id":"2","name":"beta"}]"#)
        }
    }

    #[tokio::test]
    async fn test_pagination_follows_link_header() {
        let router = Router::new().route("/api/v1/organizations", get(paged_orgs));
        let addr = serve(router).await;

        let (calls, requests) = recorder();
        let api = api_for(addr, calls);

        let orgs = api.organizations().await.unwrap();
        assert_eq!(orgs.len(), 3);
        assert_eq!(orgs[2].name, "gamma");

        // Both pages recorded as successful calls.
        assert_eq!(
            requests
                .with_label_values(&["organizations", "success"])
                .get() as u64,
            2
        );
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_typed_error() {
        let router = Router::new().route(
            "/api/v1/organizations",
            get(|| async {
                let mut headers = HeaderMap::new();
                headers.insert("retry-after", "2".parse().unwrap());
                (StatusCode::TOO_MANY_REQUESTS, headers, "")
            }),
        );
        let addr = serve(router).await;

        let (calls, requests) = recorder();
        let api = api_for(addr, calls);

        let err = api.organizations().await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { retry_after: Some(2) }));
        assert_eq!(
            requests
                .with_label_values(&["organizations", "rate_limit"])
                .get() as u64,
            1
        );
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_not_available() {
        let router = Router::new();
        let addr = serve(router).await;

        let (calls, _) = recorder();
        let api = api_for(addr, calls);

        let err = api.license_overview("org1").await.unwrap_err();
        assert!(err.is_not_available());
    }

    #[tokio::test]
    async fn test_server_error_maps_to_server_kind() {
        let router = Router::new().route(
            "/api/v1/organizations",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let addr = serve(router).await;

        let (calls, _) = recorder();
        let api = api_for(addr, calls);

        let err = api.organizations().await.unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 500 }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation() {
        let router = Router::new().route(
            "/api/v1/organizations",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/json")],
                    r#"{"not": "a list"}"#,
                )
            }),
        );
        let addr = serve(router).await;

        let (calls, _) = recorder();
        let api = api_for(addr, calls);

        let err = api.organizations().await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
