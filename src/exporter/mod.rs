use crate::{
    api::{ApiSettings, DashboardApi},
    cli::telemetry::shutdown_tracer,
    collectors::{
        CollectorContext,
        config::{CollectorConfig, TierIntervals},
        registry::CollectorRegistry,
        runstats::RunStats,
        scheduler::{CollectorManager, SchedulerSettings},
    },
    metrics::MetricStore,
    metrics::retain::RetainingValueCache,
    store::{ClientStore, DeviceDirectory},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Request},
    middleware::{Next, from_fn},
    response::Response,
    routing::{get, post},
};
use opentelemetry::global;
use opentelemetry::trace::{TraceContextExt, TraceId};
use opentelemetry_http::HeaderExtractor;
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use ulid::Ulid;

mod handlers;
mod shutdown;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = if let Some(hash) = built_info::GIT_COMMIT_HASH {
    hash
} else {
    ":-("
};

#[derive(Clone, Debug)]
pub struct WebhookSettings {
    pub enabled: bool,
    pub require_secret: bool,
    pub secret: Option<SecretString>,
    pub max_body_bytes: usize,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            require_secret: true,
            secret: None,
            max_body_bytes: 64 * 1024,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExporterSettings {
    pub port: u16,
    pub listen: Option<String>,
    pub api: ApiSettings,
    /// Organization ids to collect; empty means all visible to the key.
    pub organizations: Vec<String>,
    pub collectors: Vec<String>,
    pub intervals: TierIntervals,
    pub collector_timeout: Duration,
    pub client_ttl: Duration,
    pub discovery_ttl: Duration,
    pub webhook: WebhookSettings,
}

pub async fn new(settings: ExporterSettings) -> Result<()> {
    let store = Arc::new(MetricStore::new());

    let stats = Arc::new(RunStats::new());
    stats
        .register(store.registry())
        .context("Failed to register run stats")?;

    let api = Arc::new(
        DashboardApi::new(&settings.api, stats.api_recorder())
            .context("Failed to build dashboard API client")?,
    );

    let config = CollectorConfig::new().with_enabled(&settings.collectors);
    let registry = CollectorRegistry::from_config(&config);
    if registry.is_empty() {
        return Err(anyhow!("No collectors enabled"));
    }

    // Duplicate metric names are a programming error; fail before serving.
    registry
        .register_metrics(store.registry())
        .context("Metric registration failed")?;

    let ctx = CollectorContext {
        retained: Arc::new(RetainingValueCache::new()),
        clients: Arc::new(ClientStore::new(settings.client_ttl)),
        directory: Arc::new(DeviceDirectory::new(settings.discovery_ttl)),
        stats: Arc::clone(&stats),
        organizations: Arc::from(settings.organizations.clone()),
    };

    let manager = Arc::new(CollectorManager::new(
        registry,
        api,
        ctx,
        SchedulerSettings {
            intervals: settings.intervals.clone(),
            collector_timeout: settings.collector_timeout,
        },
    ));
    let collector_names = manager.collector_names();
    let tier_tasks = manager.spawn();

    let webhook_state = handlers::WebhookState::new(&settings.webhook, &store)
        .context("Failed to set up webhook receiver")?;
    let health_state = handlers::HealthState::new(collector_names.clone());

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(make_span)
        .on_response(on_response);

    let app = Router::new()
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health).options(handlers::health))
        .route("/cardinality", get(handlers::cardinality))
        .route("/webhook", post(handlers::webhook))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(trace_layer)
                .layer(from_fn(add_trace_headers))
                .layer(DefaultBodyLimit::max(
                    settings.webhook.max_body_bytes.saturating_add(1024),
                ))
                .layer(Extension(Arc::clone(&store)))
                .layer(Extension(webhook_state))
                .layer(Extension(health_state)),
        );

    let (listener, bind_addr) = bind(settings.port, settings.listen.as_deref()).await?;

    println!(
        "{} {} - Listening on {bind_addr}\n\nEnabled collectors:\n{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        format_list(&collector_names),
    );

    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await
    {
        error!(error=%e, "server error");
    }

    for task in tier_tasks {
        task.abort();
    }

    info!("shutting down");

    shutdown_tracer();

    Ok(())
}

async fn bind(port: u16, listen: Option<&str>) -> Result<(TcpListener, String)> {
    match listen {
        Some(addr) => {
            // Try to parse as IpAddr to validate and determine type
            match addr.parse::<std::net::IpAddr>() {
                Ok(ip) => {
                    let bind_addr = format!("{ip}:{port}");
                    Ok((
                        TcpListener::bind(&bind_addr)
                            .await
                            .with_context(|| format!("Failed to bind to {bind_addr}"))?,
                        if ip.is_ipv6() {
                            format!("[{ip}]:{port}")
                        } else {
                            bind_addr.clone()
                        },
                    ))
                }
                Err(_) => Err(anyhow!(
                    "Invalid IP address: '{}'. Expected IPv4 (e.g., 0.0.0.0, 127.0.0.1) or IPv6 (e.g., ::, ::1)",
                    addr
                )),
            }
        }
        None => {
            // Auto: try IPv6 first, fallback to IPv4
            match TcpListener::bind(format!("::0:{port}")).await {
                Ok(l) => Ok((l, format!("[::]:{port}"))),
                Err(_) => Ok((
                    TcpListener::bind(format!("0.0.0.0:{port}")).await?,
                    format!("0.0.0.0:{port}"),
                )),
            }
        }
    }
}

// Helper to format a list of items with a leading dash and indentation for the
// start up message
fn format_list<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| format!("  - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn make_span(request: &Request<Body>) -> Span {
    let parent_cx =
        global::get_text_map_propagator(|prop| prop.extract(&HeaderExtractor(request.headers())));

    let method = request.method().as_str();

    let path = request.uri().path();

    let target = request.uri().to_string();

    let scheme = request.uri().scheme_str().unwrap_or("http");

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none");

    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let span = info_span!(
        "http.server.request",
        otel.kind = "server",
        http.method = method,
        http.route = path,
        http.target = target,
        http.scheme = scheme,
        http.user_agent = user_agent,
        request_id = request_id,
    );

    let _ = span.set_parent(parent_cx);

    span
}

fn on_response<B>(response: &axum::http::Response<B>, latency: Duration, span: &Span) {
    if response.status().is_server_error() {
        span.record("otel.status_code", "ERROR");
    } else {
        span.record("otel.status_code", "OK");
    }

    let cx = span.context();
    let trace_id = cx.span().span_context().trace_id();

    if trace_id != TraceId::INVALID {
        info!(
            parent: span,
            status = response.status().as_u16(),
            elapsed_ms = latency.as_millis() as u64,
            trace_id = %trace_id,
            "request completed"
        );
    } else {
        info!(
            parent: span,
            status = response.status().as_u16(),
            elapsed_ms = latency.as_millis() as u64,
            "request completed"
        );
    }
}

async fn add_trace_headers(req: Request<Body>, next: Next) -> Response {
    let mut res = next.run(req).await;

    let span = Span::current();

    let cx = span.context();

    // CLONE the SpanContext to avoid borrowing a temporary
    let span_context = cx.span().span_context().clone();

    if span_context.is_valid()
        && let Ok(val) = HeaderValue::from_str(&span_context.trace_id().to_string())
    {
        res.headers_mut()
            .insert(HeaderName::from_static("x-trace-id"), val);
    }

    res
}
