//! Static service routes

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
};
use common::{
    context::RequestContext,
    error::ServiceError,
    metrics::Metrics,
    proto::{
        Empty, MediaKind, PING,
        media::{
            FILE_CHUNK_SIZE, GET_STATIC, GET_STATIC_FILE, SERVICE, StaticId, StaticUri,
            UPLOAD_STATIC,
        },
    },
    rpc::{RpcJson, health_router, rpc_path, with_common_layers},
};
use futures::StreamExt;
use percent_encoding::percent_decode_str;
use std::{collections::HashMap, sync::Arc};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::{error::MediaError, service::MediaService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub media: MediaService,
}

/// Create the router for the static service
pub fn create_router(state: AppState, metrics: Arc<Metrics>) -> Router {
    let rpc = Router::new()
        .route(&rpc_path(SERVICE, GET_STATIC), post(get_static))
        .route(
            &rpc_path(SERVICE, UPLOAD_STATIC),
            post(upload_static).layer(DefaultBodyLimit::disable()),
        )
        .route(&rpc_path(SERVICE, GET_STATIC_FILE), post(get_static_file))
        .route(&rpc_path(SERVICE, PING), post(ping))
        .with_state(state);

    with_common_layers(rpc.merge(health_router(SERVICE)), metrics)
}

/// Accumulate a streamed body, giving up as soon as it grows past `limit`
async fn read_limited(body: Body, limit: usize) -> Result<Vec<u8>, MediaError> {
    let mut stream = body.into_data_stream();
    let mut buffer = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| MediaError::Interrupted(e.to_string()))?;
        if buffer.len() + chunk.len() > limit {
            return Err(MediaError::TooBig { limit });
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer)
}

fn upload_kind(query: &HashMap<String, String>) -> Result<MediaKind, ServiceError> {
    let raw = query
        .get("kind")
        .ok_or_else(|| ServiceError::BadRequest("missing kind".to_string()))?;
    Ok(raw.parse::<MediaKind>()?)
}

pub async fn get_static(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<StaticId>,
) -> Result<Json<StaticUri>, ServiceError> {
    let uri = state.media.uri(payload.id).await?;
    Ok(Json(StaticUri { uri }))
}

pub async fn upload_static(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<HashMap<String, String>>,
    body: Body,
) -> Result<Json<StaticId>, ServiceError> {
    let kind = upload_kind(&query)?;

    let result = match read_limited(body, state.media.max_size()).await {
        Ok(upload) => state.media.ingest(kind, upload).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(id) => Ok(Json(StaticId { id })),
        Err(e) => {
            warn!(request_id = %ctx.request_id, "Upload rejected: {}", e);
            Err(e.into())
        }
    }
}

pub async fn get_static_file(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<StaticUri>,
) -> Result<Response, ServiceError> {
    let uri = percent_decode_str(&payload.uri)
        .decode_utf8()
        .map_err(|e| ServiceError::from(MediaError::InvalidUri(e.to_string())))?;

    let file = state.media.storage().open(&uri).await?;
    info!("Streaming {}", uri);

    let stream = ReaderStream::with_capacity(file, FILE_CHUNK_SIZE);
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(stream),
    )
        .into_response())
}

pub async fn ping(State(state): State<AppState>) -> Result<Json<Empty>, ServiceError> {
    state.media.ping().await?;
    Ok(Json(Empty {}))
}
