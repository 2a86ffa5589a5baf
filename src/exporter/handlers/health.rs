use crate::exporter::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

#[derive(Clone)]
pub struct HealthState {
    started: Instant,
    collectors: Arc<Vec<&'static str>>,
}

impl HealthState {
    pub fn new(collectors: Vec<&'static str>) -> Self {
        Self {
            started: Instant::now(),
            collectors: Arc::new(collectors),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    uptime_seconds: u64,
    collectors: Vec<String>,
}

fn create_health_response(state: &HealthState) -> Health {
    Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started.elapsed().as_secs(),
        collectors: state.collectors.iter().map(|c| c.to_string()).collect(),
    }
}

// Create response body based on method
fn create_response_body(method: &Method, health: &Health) -> Body {
    if *method == Method::GET {
        Json(health).into_response().into_body()
    } else {
        Body::empty()
    }
}

// Create X-App header
fn create_app_headers(health: &Health) -> HeaderMap {
    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let header_value = format!("{}:{}:{}", health.name, health.version, short_hash);

    match header_value.parse::<HeaderValue>() {
        Ok(x_app_header_value) => {
            debug!("X-App header: {:?}", x_app_header_value);
            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        }
        Err(err) => {
            debug!("Failed to parse X-App header: {}", err);
            HeaderMap::new()
        }
    }
}

/// Process liveness. The exporter serves cached state regardless of API
/// availability, so health is "the process is up", nothing more.
pub async fn health(method: Method, state: Extension<HealthState>) -> impl IntoResponse {
    let health = create_health_response(&state.0);
    let body = create_response_body(&method, &health);
    let headers = create_app_headers(&health);

    (StatusCode::OK, headers, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_fields() {
        let state = HealthState::new(vec!["devices", "uplinks"]);
        let health = create_health_response(&state);

        assert_eq!(health.name, env!("CARGO_PKG_NAME"));
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(health.collectors, vec!["devices", "uplinks"]);
    }

    #[test]
    fn test_app_header_shape() {
        let state = HealthState::new(vec![]);
        let health = create_health_response(&state);
        let headers = create_app_headers(&health);

        let value = headers.get("X-App").unwrap().to_str().unwrap();
        assert!(value.starts_with(&format!(
            "{}:{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )));
    }

    #[test]
    fn test_options_gets_empty_body() {
        let state = HealthState::new(vec!["devices"]);
        let health = create_health_response(&state);

        // GET carries JSON, OPTIONS does not; we only check it constructs.
        let _ = create_response_body(&Method::OPTIONS, &health);
        let _ = create_response_body(&Method::GET, &health);
    }
}
