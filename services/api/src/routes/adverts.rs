//! Advert reads

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::advert::{Advert, Category, Page, PriceChange},
    state::AppState,
};

pub async fn list(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Advert>>> {
    let (limit, offset) = page.bounds();
    Ok(Json(state.adverts.list(limit, offset).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(advert_id): Path<Uuid>,
) -> ApiResult<Json<Advert>> {
    state
        .adverts
        .get(advert_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("advert not found"))
}

pub async fn by_seller(
    State(state): State<AppState>,
    Path(seller_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Advert>>> {
    Ok(Json(state.adverts.by_seller(seller_id).await?))
}

pub async fn categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.adverts.categories().await?))
}

pub async fn price_history(
    State(state): State<AppState>,
    Path(advert_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PriceChange>>> {
    Ok(Json(state.adverts.price_history(advert_id).await?))
}
