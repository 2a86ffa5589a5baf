use crate::exporter::WebhookSettings;
use crate::metrics::MetricStore;
use anyhow::Result;
use axum::{
    Json,
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use prometheus::CounterVec;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone)]
pub struct WebhookState {
    enabled: bool,
    require_secret: bool,
    secret: Option<SecretString>,
    max_body_bytes: usize,
    events: CounterVec,
}

impl WebhookState {
    pub fn new(settings: &WebhookSettings, store: &MetricStore) -> Result<Self> {
        let events = store.counter_vec(
            "dash_exporter_webhook_events_total",
            "Webhook events received by alert type",
            &["alert_type"],
        )?;

        Ok(Self {
            enabled: settings.enabled,
            require_secret: settings.require_secret,
            secret: settings.secret.clone(),
            max_body_bytes: settings.max_body_bytes,
            events,
        })
    }
}

/// The vendor posts a JSON envelope; only the fields we act on are decoded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload {
    #[serde(default)]
    shared_secret: Option<String>,
    #[serde(default)]
    alert_type: Option<String>,
    #[serde(default)]
    organization_id: Option<String>,
    #[serde(default)]
    network_id: Option<String>,
}

#[derive(Serialize)]
struct WebhookReply {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn reject(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(WebhookReply {
            status: "error",
            error: Some(message.to_string()),
        }),
    )
        .into_response()
}

/// Inbound alert receiver.
///
/// 404 when the feature is off, 400 for oversized or malformed bodies, 401
/// for a missing/invalid shared secret, 200 with a status body otherwise.
pub async fn webhook(Extension(state): Extension<WebhookState>, body: Bytes) -> Response {
    if !state.enabled {
        return reject(StatusCode::NOT_FOUND, "webhook receiver is disabled");
    }

    if body.len() > state.max_body_bytes {
        warn!(bytes = body.len(), "webhook payload too large");
        return reject(StatusCode::BAD_REQUEST, "payload too large");
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "malformed webhook payload");
            return reject(StatusCode::BAD_REQUEST, "malformed payload");
        }
    };

    if state.require_secret {
        let expected = state
            .secret
            .as_ref()
            .map(|s| s.expose_secret().to_string())
            .unwrap_or_default();
        let presented = payload.shared_secret.as_deref().unwrap_or_default();

        if expected.is_empty() || presented != expected {
            warn!("webhook rejected: invalid or missing shared secret");
            return reject(StatusCode::UNAUTHORIZED, "invalid or missing shared secret");
        }
    }

    let alert_type = payload.alert_type.as_deref().unwrap_or("unknown");
    state.events.with_label_values(&[alert_type]).inc();

    info!(
        alert_type,
        organization = payload.organization_id.as_deref().unwrap_or("-"),
        network = payload.network_id.as_deref().unwrap_or("-"),
        "webhook event received"
    );

    (
        StatusCode::OK,
        Json(WebhookReply {
            status: "ok",
            error: None,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(settings: WebhookSettings) -> WebhookState {
        let store = MetricStore::new();
        WebhookState::new(&settings, &store).unwrap()
    }

    fn enabled_with_secret() -> WebhookState {
        state(WebhookSettings {
            enabled: true,
            require_secret: true,
            secret: Some(SecretString::from("s3cret")),
            max_body_bytes: 1024,
        })
    }

    #[tokio::test]
    async fn test_disabled_returns_404() {
        let state = state(WebhookSettings::default());
        let response = webhook(Extension(state), Bytes::from_static(b"{}")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_secret_returns_401() {
        let state = enabled_with_secret();
        let body = Bytes::from_static(br#"{"sharedSecret":"nope","alertType":"x"}"#);
        let response = webhook(Extension(state), body).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_secret_returns_401() {
        let state = enabled_with_secret();
        let response = webhook(Extension(state), Bytes::from_static(b"{}")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_correct_secret_returns_200_and_counts_event() {
        let state = enabled_with_secret();
        let events = state.events.clone();

        let body =
            Bytes::from_static(br#"{"sharedSecret":"s3cret","alertType":"uplink status changed"}"#);
        let response = webhook(Extension(state), body).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            events
                .with_label_values(&["uplink status changed"])
                .get(),
            1.0
        );
    }

    #[tokio::test]
    async fn test_malformed_body_returns_400() {
        let state = enabled_with_secret();
        let response = webhook(Extension(state), Bytes::from_static(b"not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_body_returns_400() {
        let state = state(WebhookSettings {
            enabled: true,
            require_secret: false,
            secret: None,
            max_body_bytes: 8,
        });
        let body = Bytes::from_static(br#"{"alertType":"settings changed"}"#);
        let response = webhook(Extension(state), body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_secret_not_required_accepts_unsigned_payloads() {
        let state = state(WebhookSettings {
            enabled: true,
            require_secret: false,
            secret: None,
            max_body_bytes: 1024,
        });
        let response = webhook(
            Extension(state),
            Bytes::from_static(br#"{"alertType":"sensor alert"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
