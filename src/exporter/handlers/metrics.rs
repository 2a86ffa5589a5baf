use crate::metrics::MetricStore;
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, error};

/// Serve whatever is currently in the metric store.
///
/// Collection happens in the background tiers; a scrape never triggers a
/// fetch and never fails because the most recent pass did. Staleness shows up
/// in the last-success metrics, not as a failed scrape.
pub async fn metrics(Extension(store): Extension<Arc<MetricStore>>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        "content-type",
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );

    match store.encode() {
        Ok(body) => {
            debug!(bytes = body.len(), "encoded metrics");
            (StatusCode::OK, headers, body)
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                headers,
                format!("Error encoding metrics: {e}"),
            )
        }
    }
}
