//! Cart/Purchase service routes

use axum::{Json, Router, extract::State, routing::post};
use common::{
    context::RequestContext,
    error::ServiceError,
    metrics::Metrics,
    proto::{
        Empty, PING,
        cart::{
            ADD_ADVERT_TO_CART, ADD_PURCHASE, AddPurchaseRequest, CHECK_CART_EXISTS,
            Cart, CartAdvertRequest, CartExists, CartIdRequest, DELETE_ADVERT_FROM_CART,
            GET_CART_BY_ID, GET_CART_BY_USER_ID, GET_PURCHASES_BY_USER_ID, PurchaseList, SERVICE,
            UserRequest,
        },
    },
    rpc::{RpcJson, health_router, rpc_path, with_common_layers},
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::repositories::CartRepository;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub carts: Arc<dyn CartRepository>,
}

/// Create the router for the cart service
pub fn create_router(state: AppState, metrics: Arc<Metrics>) -> Router {
    let rpc = Router::new()
        .route(&rpc_path(SERVICE, ADD_PURCHASE), post(add_purchase))
        .route(
            &rpc_path(SERVICE, GET_PURCHASES_BY_USER_ID),
            post(get_purchases_by_user_id),
        )
        .route(&rpc_path(SERVICE, GET_CART_BY_ID), post(get_cart_by_id))
        .route(&rpc_path(SERVICE, GET_CART_BY_USER_ID), post(get_cart_by_user_id))
        .route(&rpc_path(SERVICE, ADD_ADVERT_TO_CART), post(add_advert_to_cart))
        .route(
            &rpc_path(SERVICE, DELETE_ADVERT_FROM_CART),
            post(delete_advert_from_cart),
        )
        .route(&rpc_path(SERVICE, CHECK_CART_EXISTS), post(check_cart_exists))
        .route(&rpc_path(SERVICE, PING), post(ping))
        .with_state(state);

    with_common_layers(rpc.merge(health_router(SERVICE)), metrics)
}

pub async fn add_purchase(
    State(state): State<AppState>,
    ctx: RequestContext,
    RpcJson(payload): RpcJson<AddPurchaseRequest>,
) -> Result<Json<PurchaseList>, ServiceError> {
    match state.carts.add_purchase(&payload).await {
        Ok(purchases) => {
            info!(
                request_id = %ctx.request_id,
                cart_id = %payload.cart_id,
                "Purchase created"
            );
            Ok(Json(PurchaseList { purchases }))
        }
        Err(e) => {
            warn!(
                request_id = %ctx.request_id,
                cart_id = %payload.cart_id,
                "Purchase rejected: {}",
                e
            );
            Err(e.into())
        }
    }
}

pub async fn get_purchases_by_user_id(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<UserRequest>,
) -> Result<Json<PurchaseList>, ServiceError> {
    let purchases = state.carts.purchases_by_user(payload.user_id).await?;
    Ok(Json(PurchaseList { purchases }))
}

pub async fn get_cart_by_id(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<CartIdRequest>,
) -> Result<Json<Cart>, ServiceError> {
    Ok(Json(state.carts.cart_by_id(payload.cart_id).await?))
}

pub async fn get_cart_by_user_id(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<UserRequest>,
) -> Result<Json<Cart>, ServiceError> {
    Ok(Json(state.carts.active_cart(payload.user_id).await?))
}

pub async fn add_advert_to_cart(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<CartAdvertRequest>,
) -> Result<Json<Cart>, ServiceError> {
    let cart = state
        .carts
        .add_advert(payload.user_id, payload.advert_id)
        .await?;
    Ok(Json(cart))
}

pub async fn delete_advert_from_cart(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<CartAdvertRequest>,
) -> Result<Json<Cart>, ServiceError> {
    let cart = state
        .carts
        .remove_advert(payload.user_id, payload.advert_id)
        .await?;
    Ok(Json(cart))
}

pub async fn check_cart_exists(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<UserRequest>,
) -> Result<Json<CartExists>, ServiceError> {
    let cart_id = state.carts.active_cart_id(payload.user_id).await?;
    Ok(Json(CartExists {
        exists: cart_id.is_some(),
        cart_id,
    }))
}

pub async fn ping(State(state): State<AppState>) -> Result<Json<Empty>, ServiceError> {
    state.carts.ping().await?;
    Ok(Json(Empty {}))
}
