//! Inter-service RPC plumbing
//!
//! Every method is `POST /rpc/{service}/{Method}`. Unary calls carry JSON,
//! streaming calls carry raw octet bodies. Errors travel as a status code
//! plus an [`ErrorBody`].

use axum::{
    Json, Router,
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Serialize, de::DeserializeOwned};
use std::{any::Any, sync::Arc, time::Duration, time::Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info, warn};

use crate::{
    context::{REQUEST_ID_HEADER, RequestContext, request_context},
    error::{ErrorBody, ServiceError},
    metrics::{Metrics, status_for_error, track_metrics},
};

pub fn rpc_path(service: &str, method: &str) -> String {
    format!("/rpc/{}/{}", service, method)
}

/// JSON body extractor whose rejection is a `BadRequest` instead of axum's 422
pub struct RpcJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for RpcJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(RpcJson(value)),
            Err(rejection) => Err(ServiceError::BadRequest(rejection.body_text())),
        }
    }
}

/// Errors seen by the calling side of an RPC
#[derive(Error, Debug)]
pub enum RpcError {
    /// The remote service answered with an error
    #[error("{0}")]
    Service(ServiceError),

    /// The call never produced a usable answer
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<RpcError> for ServiceError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Service(err) => err,
            RpcError::Transport(err) => {
                error!("Upstream call failed: {}", err);
                ServiceError::Internal(format!("upstream unavailable: {}", err))
            }
        }
    }
}

fn error_from_status(status: StatusCode, text: String) -> ServiceError {
    if let Ok(body) = serde_json::from_str::<ErrorBody>(&text) {
        return ServiceError::from_body(body);
    }
    match status {
        StatusCode::UNAUTHORIZED => ServiceError::Unauthorized(text),
        StatusCode::FORBIDDEN => ServiceError::Forbidden(text),
        StatusCode::NOT_FOUND => ServiceError::NotFound(text),
        s if s.is_client_error() => ServiceError::BadRequest(text),
        _ => ServiceError::Internal(text),
    }
}

/// Outbound client for one downstream service, instrumented with [`Metrics`]
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    base_url: String,
    service: String,
    metrics: Arc<Metrics>,
}

impl RpcClient {
    pub fn new(
        base_url: &str,
        service: &str,
        timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            service: service.to_string(),
            metrics,
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}{}", self.base_url, rpc_path(&self.service, method))
    }

    fn observe<T>(&self, method: &str, start: Instant, result: &Result<T, RpcError>, status: u16) {
        let status = match result {
            Ok(_) => status,
            Err(RpcError::Service(err)) => err.status_code().as_u16(),
            Err(RpcError::Transport(err)) => err
                .status()
                .map(|s| s.as_u16())
                .unwrap_or_else(|| status_for_error(&err.to_string())),
        };
        self.metrics.record(method, status, start.elapsed());
    }

    async fn send(
        &self,
        method: &str,
        ctx: &RequestContext,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RpcError> {
        let response = builder
            .header(REQUEST_ID_HEADER, ctx.request_id.to_string())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        warn!(
            service = %self.service,
            method,
            status = status.as_u16(),
            "RPC returned an error"
        );
        Err(RpcError::Service(error_from_status(status, text)))
    }

    /// Unary call: JSON request, JSON response
    pub async fn call<Req, Resp>(
        &self,
        ctx: &RequestContext,
        method: &str,
        request: &Req,
    ) -> Result<Resp, RpcError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let start = Instant::now();
        let builder = self.http.post(self.url(method)).json(request);

        let result = match self.send(method, ctx, builder).await {
            Ok(response) => response.json::<Resp>().await.map_err(RpcError::from),
            Err(err) => Err(err),
        };

        self.observe(method, start, &result, 200);
        result
    }

    /// Client-streaming call: the body is sent chunked, the answer is JSON
    pub async fn call_upload<Resp>(
        &self,
        ctx: &RequestContext,
        method: &str,
        query: &[(&str, &str)],
        body: reqwest::Body,
    ) -> Result<Resp, RpcError>
    where
        Resp: DeserializeOwned,
    {
        let start = Instant::now();
        let builder = self
            .http
            .post(self.url(method))
            .query(query)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body);

        let result = match self.send(method, ctx, builder).await {
            Ok(response) => response.json::<Resp>().await.map_err(RpcError::from),
            Err(err) => Err(err),
        };

        self.observe(method, start, &result, 200);
        result
    }

    /// Server-streaming call: JSON request, the raw response is handed back
    /// for the caller to stream
    pub async fn call_download<Req>(
        &self,
        ctx: &RequestContext,
        method: &str,
        request: &Req,
    ) -> Result<reqwest::Response, RpcError>
    where
        Req: Serialize + ?Sized,
    {
        let start = Instant::now();
        let builder = self.http.post(self.url(method)).json(request);
        let result = self.send(method, ctx, builder).await;
        self.observe(method, start, &result, 200);
        result
    }
}

/// `GET /health` for a service
pub fn health_router<S>(service: &'static str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/health",
        get(move || async move {
            Json(serde_json::json!({
                "status": "ok",
                "service": service
            }))
        }),
    )
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("Handler panicked: {}", detail);

    let err = ServiceError::Internal(detail);
    (err.status_code(), Json(err.to_body())).into_response()
}

/// Wrap a router with the interceptor chain every service uses: metrics on
/// matched routes, request context, and panic recovery. Panics are turned
/// into responses below the metrics layer so they are counted as 500s.
pub fn with_common_layers(router: Router, metrics: Arc<Metrics>) -> Router {
    router
        .route_layer(CatchPanicLayer::custom(panic_response))
        .route_layer(middleware::from_fn_with_state(metrics, track_metrics))
        .layer(middleware::from_fn(request_context))
}

/// Bind and serve until `shutdown` is cancelled
pub async fn serve(addr: &str, router: Router, shutdown: CancellationToken) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Cancel `token` on Ctrl-C
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
        token.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::post};
    use prometheus::Registry;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[allow(dead_code)]
        count: u32,
    }

    async fn accept(RpcJson(_payload): RpcJson<Payload>) -> StatusCode {
        StatusCode::OK
    }

    async fn explode() -> StatusCode {
        panic!("boom")
    }

    fn app_with(metrics: Arc<Metrics>) -> Router {
        with_common_layers(
            Router::new()
                .route("/rpc/t/Accept", post(accept))
                .route("/rpc/t/Explode", post(explode)),
            metrics,
        )
    }

    fn app() -> Router {
        let registry = Registry::new();
        app_with(Arc::new(Metrics::new(&registry, "t", "t").unwrap()))
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rpc/t/Accept")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"count":-1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.error, "bad_request");
    }

    #[tokio::test]
    async fn test_panics_become_internal_errors() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rpc/t/Explode")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_panics_are_counted_as_errors() {
        let registry = Registry::new();
        let metrics = Arc::new(Metrics::new(&registry, "t", "t").unwrap());

        let response = app_with(metrics.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rpc/t/Explode")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(metrics.hit_count("Explode"), 1);
        assert_eq!(metrics.error_count("Explode"), 1);
        assert_eq!(metrics.timing_count("Explode"), 1);
    }

    #[test]
    fn test_error_from_status_prefers_body() {
        let body = serde_json::to_string(&ServiceError::Conflict("cart is not active".into()).to_body())
            .unwrap();
        assert_eq!(
            error_from_status(StatusCode::BAD_REQUEST, body),
            ServiceError::Conflict("cart is not active".into())
        );
        assert_eq!(
            error_from_status(StatusCode::NOT_FOUND, "gone".into()),
            ServiceError::NotFound("gone".into())
        );
    }
}
