//! Promotion payments

use axum::{
    Json,
    extract::{Query, State},
};
use common::rpc::RpcJson;
use std::collections::HashMap;
use tracing::info;

use crate::{
    error::ApiResult,
    middleware::CurrentUser,
    models::payment::{InitPaymentRequest, InitPaymentResponse},
    state::AppState,
};

pub async fn init(
    State(state): State<AppState>,
    user: CurrentUser,
    RpcJson(request): RpcJson<InitPaymentRequest>,
) -> ApiResult<Json<InitPaymentResponse>> {
    let payment_url = state
        .payments
        .initiate(user.user_id, request.item_id)
        .await?;
    Ok(Json(InitPaymentResponse { payment_url }))
}

/// Landing page after the provider's confirmation screen; echoes its query
pub async fn callback(Query(params): Query<HashMap<String, String>>) -> Json<HashMap<String, String>> {
    info!(?params, "Payment callback");
    Json(params)
}
