//! Media upload and download through the static service

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use common::{
    context::RequestContext,
    proto::{
        MediaKind,
        media::{GET_STATIC, GET_STATIC_FILE, StaticId, StaticUri, UPLOAD_STATIC},
    },
};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::CurrentUser,
    state::AppState,
};

pub async fn uri(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(file_id): Path<Uuid>,
) -> ApiResult<Json<StaticUri>> {
    let uri = state
        .clients
        .media
        .call(&ctx, GET_STATIC, &StaticId { id: file_id })
        .await?;
    Ok(Json(uri))
}

/// Stream the request body to the static service as it arrives
pub async fn upload(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
    Path(kind): Path<String>,
    body: Body,
) -> ApiResult<Json<StaticId>> {
    let kind = kind.parse::<MediaKind>().map_err(|e| ApiError::Service(e.into()))?;

    let stream = reqwest::Body::wrap_stream(body.into_data_stream());
    let stored: StaticId = state
        .clients
        .media
        .call_upload(&ctx, UPLOAD_STATIC, &[("kind", kind.as_str())], stream)
        .await?;

    info!(user_id = %user.user_id, media_id = %stored.id, %kind, "Media uploaded");
    Ok(Json(stored))
}

pub async fn download(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(path): Path<String>,
) -> ApiResult<Response> {
    let upstream = state
        .clients
        .media
        .call_download(&ctx, GET_STATIC_FILE, &StaticUri { uri: path })
        .await?;

    Ok((
        [(header::CONTENT_TYPE, "image/webp")],
        Body::from_stream(upstream.bytes_stream()),
    )
        .into_response())
}
