//! Metrics interceptor
//!
//! Counts hits, errors and latency per (service, method, status code) on both
//! sides of every call. Servers wrap their routers with [`track_metrics`];
//! [`crate::rpc::RpcClient`] records outbound calls through the same type.

use axum::{
    Router,
    extract::{MatchedPath, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const METRICS_PATH: &str = "/api/v1/metrics";

const LABELS: [&str; 3] = ["service", "method", "status_code"];

/// Hit, error and latency collectors for one side of one service
#[derive(Clone)]
pub struct Metrics {
    service: String,
    hits: IntCounterVec,
    errors: IntCounterVec,
    timing: HistogramVec,
}

impl Metrics {
    /// Create the collectors `{prefix}_total_hits_count`, `{prefix}_error_hits_count`
    /// and `{prefix}_total_timing`, registering them in `registry`.
    pub fn new(registry: &Registry, prefix: &str, service: &str) -> prometheus::Result<Self> {
        let hits = IntCounterVec::new(
            Opts::new(
                format!("{}_total_hits_count", prefix),
                "Number of calls handled",
            ),
            &LABELS,
        )?;
        let errors = IntCounterVec::new(
            Opts::new(
                format!("{}_error_hits_count", prefix),
                "Number of calls that ended in an error",
            ),
            &LABELS,
        )?;
        let timing = HistogramVec::new(
            HistogramOpts::new(format!("{}_total_timing", prefix), "Call latency in seconds"),
            &LABELS,
        )?;

        registry.register(Box::new(hits.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(timing.clone()))?;

        Ok(Self {
            service: service.to_string(),
            hits,
            errors,
            timing,
        })
    }

    /// Record one finished call
    pub fn record(&self, method: &str, status: u16, elapsed: Duration) {
        let code = status.to_string();
        let labels = [self.service.as_str(), method, code.as_str()];

        self.hits.with_label_values(&labels).inc();
        if status >= 400 {
            self.errors.with_label_values(&labels).inc();
        }
        self.timing
            .with_label_values(&labels)
            .observe(elapsed.as_secs_f64());
    }

    /// Total hits for `method` across all status codes
    pub fn hit_count(&self, method: &str) -> u64 {
        sum_counter(&self.hits, method)
    }

    /// Total errors for `method` across all status codes
    pub fn error_count(&self, method: &str) -> u64 {
        sum_counter(&self.errors, method)
    }

    /// Number of latency observations for `method`
    pub fn timing_count(&self, method: &str) -> u64 {
        use prometheus::core::Collector;

        self.timing
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .filter(|metric| has_method(metric, method))
            .map(|metric| metric.get_histogram().get_sample_count())
            .sum()
    }
}

fn has_method(metric: &prometheus::proto::Metric, method: &str) -> bool {
    metric
        .get_label()
        .iter()
        .any(|pair| pair.get_name() == "method" && pair.get_value() == method)
}

fn sum_counter(counter: &IntCounterVec, method: &str) -> u64 {
    use prometheus::core::Collector;

    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .filter(|metric| has_method(metric, method))
        .map(|metric| metric.get_counter().get_value() as u64)
        .sum()
}

/// Map an internal error message onto an HTTP-like status code for labelling
pub fn status_for_error(message: &str) -> u16 {
    let message = message.to_lowercase();
    if message.contains("unauthorized") || message.contains("unauthenticated") {
        401
    } else if message.contains("forbidden") || message.contains("permission denied") {
        403
    } else if message.contains("not found") || message.contains("not_found") {
        404
    } else if message.contains("internal") {
        500
    } else {
        400
    }
}

/// Label for a request: the RPC method for `/rpc/{service}/{Method}`,
/// otherwise the matched route template.
fn method_label(req: &Request) -> String {
    let path = req.uri().path();
    if let Some(rest) = path.strip_prefix("/rpc/") {
        if let Some((_, method)) = rest.split_once('/') {
            return method.to_string();
        }
    }

    req.extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Server-side interceptor; install with `route_layer(from_fn_with_state(..))`
pub async fn track_metrics(
    State(metrics): State<Arc<Metrics>>,
    req: Request,
    next: Next,
) -> Response {
    let method = method_label(&req);
    let start = Instant::now();

    let response = next.run(req).await;

    metrics.record(&method, response.status().as_u16(), start.elapsed());
    response
}

/// Render the registry in the Prometheus text format
pub async fn render(State(registry): State<Registry>) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Router exposing only the scrape endpoint
pub fn metrics_router(registry: Registry) -> Router {
    Router::new()
        .route(METRICS_PATH, get(render))
        .with_state(registry)
}

/// Serve the scrape endpoint on its own listener until `shutdown` fires
pub async fn serve_metrics(
    addr: &str,
    registry: Registry,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics endpoint listening on {}{}", addr, METRICS_PATH);

    axum::serve(listener, metrics_router(registry))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::post};
    use tower::ServiceExt;

    #[test]
    fn test_status_for_error_table() {
        assert_eq!(status_for_error("Unauthorized"), 401);
        assert_eq!(status_for_error("advert not found"), 404);
        assert_eq!(status_for_error("forbidden: not the owner"), 403);
        assert_eq!(status_for_error("cart is not active"), 400);
    }

    #[test]
    fn test_record_counts_errors_separately() {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry, "test", "test").unwrap();

        metrics.record("AddPurchase", 200, Duration::from_millis(3));
        metrics.record("AddPurchase", 400, Duration::from_millis(3));
        metrics.record("Ping", 200, Duration::from_millis(1));

        assert_eq!(metrics.hit_count("AddPurchase"), 2);
        assert_eq!(metrics.error_count("AddPurchase"), 1);
        assert_eq!(metrics.timing_count("AddPurchase"), 2);
        assert_eq!(metrics.hit_count("Ping"), 1);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        Metrics::new(&registry, "dup", "dup").unwrap();
        assert!(Metrics::new(&registry, "dup", "dup").is_err());
    }

    #[tokio::test]
    async fn test_interceptor_labels_rpc_method() {
        let registry = Registry::new();
        let metrics = Arc::new(Metrics::new(&registry, "svc", "svc").unwrap());

        let app = Router::new()
            .route("/rpc/svc/DoThing", post(|| async { StatusCode::NOT_FOUND }))
            .route_layer(middleware::from_fn_with_state(
                metrics.clone(),
                track_metrics,
            ));

        app.oneshot(
            Request::builder()
                .method("POST")
                .uri("/rpc/svc/DoThing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(metrics.hit_count("DoThing"), 1);
        assert_eq!(metrics.error_count("DoThing"), 1);
    }

    #[tokio::test]
    async fn test_render_exposes_text_format() {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry, "scrape", "scrape").unwrap();
        metrics.record("Ping", 200, Duration::from_millis(1));

        let response = metrics_router(registry)
            .oneshot(
                Request::builder()
                    .uri(METRICS_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("scrape_total_hits_count"));
        assert!(text.contains("method=\"Ping\""));
    }
}
