//! Cart editing and checkout

use axum::{
    Json,
    extract::{Path, State},
};
use common::{
    context::RequestContext,
    proto::{
        DeliveryMethod, PaymentMethod,
        cart::{
            ADD_ADVERT_TO_CART, ADD_PURCHASE, AddPurchaseRequest, CHECK_CART_EXISTS,
            Cart, CartAdvertRequest, CartExists, CartIdRequest, DELETE_ADVERT_FROM_CART,
            GET_CART_BY_ID, GET_CART_BY_USER_ID, GET_PURCHASES_BY_USER_ID, PurchaseList,
            UserRequest,
        },
    },
    rpc::RpcJson,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::CurrentUser,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub cart_id: Uuid,
    pub address: String,
    pub payment_method: PaymentMethod,
    pub delivery_method: DeliveryMethod,
}

pub async fn cart(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
) -> ApiResult<Json<Cart>> {
    let cart = state
        .clients
        .cart
        .call(
            &ctx,
            GET_CART_BY_USER_ID,
            &UserRequest {
                user_id: user.user_id,
            },
        )
        .await?;
    Ok(Json(cart))
}

pub async fn cart_by_id(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
    Path(cart_id): Path<Uuid>,
) -> ApiResult<Json<Cart>> {
    let cart: Cart = state
        .clients
        .cart
        .call(&ctx, GET_CART_BY_ID, &CartIdRequest { cart_id })
        .await?;

    if cart.user_id != user.user_id {
        return Err(ApiError::forbidden("cart belongs to another user"));
    }
    Ok(Json(cart))
}

pub async fn cart_exists(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
) -> ApiResult<Json<CartExists>> {
    let exists = state
        .clients
        .cart
        .call(
            &ctx,
            CHECK_CART_EXISTS,
            &UserRequest {
                user_id: user.user_id,
            },
        )
        .await?;
    Ok(Json(exists))
}

pub async fn add_advert(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
    Path(advert_id): Path<Uuid>,
) -> ApiResult<Json<Cart>> {
    let cart = state
        .clients
        .cart
        .call(
            &ctx,
            ADD_ADVERT_TO_CART,
            &CartAdvertRequest {
                user_id: user.user_id,
                advert_id,
            },
        )
        .await?;
    Ok(Json(cart))
}

pub async fn remove_advert(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
    Path(advert_id): Path<Uuid>,
) -> ApiResult<Json<Cart>> {
    let cart = state
        .clients
        .cart
        .call(
            &ctx,
            DELETE_ADVERT_FROM_CART,
            &CartAdvertRequest {
                user_id: user.user_id,
                advert_id,
            },
        )
        .await?;
    Ok(Json(cart))
}

pub async fn checkout(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
    RpcJson(form): RpcJson<CheckoutForm>,
) -> ApiResult<Json<PurchaseList>> {
    let purchases = state
        .clients
        .cart
        .call(
            &ctx,
            ADD_PURCHASE,
            &AddPurchaseRequest {
                cart_id: form.cart_id,
                user_id: user.user_id,
                address: form.address,
                payment_method: form.payment_method,
                delivery_method: form.delivery_method,
            },
        )
        .await?;
    Ok(Json(purchases))
}

pub async fn purchases(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
) -> ApiResult<Json<PurchaseList>> {
    let purchases = state
        .clients
        .cart
        .call(
            &ctx,
            GET_PURCHASES_BY_USER_ID,
            &UserRequest {
                user_id: user.user_id,
            },
        )
        .await?;
    Ok(Json(purchases))
}
