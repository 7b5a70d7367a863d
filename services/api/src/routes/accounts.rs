//! Signup, login, sessions and profiles

use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::cookie::CookieJar;
use common::{
    context::RequestContext,
    error::ServiceError,
    proto::{
        Empty,
        auth::DeletedCount,
        media::{GET_STATIC, StaticId, StaticUri},
    },
    rpc::RpcJson,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    csrf::CSRF_HEADER,
    error::{ApiError, ApiResult},
    middleware::{CurrentUser, expired_session_cookie, session_cookie},
    models::{Credentials, PasswordChange, Profile, ProfileUpdate, PublicProfile, SessionResponse},
    rate_limiter::Attempt,
    repositories::users::{hash_password, verify_password},
    state::AppState,
    validation::{validate_email, validate_password, validate_phone, validate_username},
};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn start_session(
    state: &AppState,
    ctx: &RequestContext,
    jar: CookieJar,
    user_id: Uuid,
) -> ApiResult<(CookieJar, Json<SessionResponse>)> {
    let token = state.sessions.create(ctx, user_id).await?;
    let jar = jar.add(session_cookie(token.clone(), state.secure_cookie));
    Ok((jar, Json(SessionResponse { session_token: token })))
}

pub async fn signup(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
    RpcJson(credentials): RpcJson<Credentials>,
) -> ApiResult<(CookieJar, Json<SessionResponse>)> {
    let email = normalize_email(&credentials.email);
    validate_email(&email)?;
    validate_password(&credentials.password)?;

    let password_hash = hash_password(&credentials.password).map_err(ApiError::internal)?;
    let user = state
        .users
        .create(&email, &password_hash)
        .await?
        .ok_or_else(|| ServiceError::Conflict("user already exists".to_string()))?;

    info!(user_id = %user.id, "User signed up");
    start_session(&state, &ctx, jar, user.id).await
}

pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
    RpcJson(credentials): RpcJson<Credentials>,
) -> ApiResult<(CookieJar, Json<SessionResponse>)> {
    let email = normalize_email(&credentials.email);
    if let Attempt::Banned(retry_after) = state.login_limiter.check(&email).await {
        return Err(ApiError::TooManyAttempts(retry_after));
    }

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::bad_request("user not found"))?;

    if !verify_password(&user.password_hash, &credentials.password) {
        return Err(ApiError::bad_request("invalid credentials"));
    }
    state.login_limiter.reset(&email).await;

    info!(user_id = %user.id, "User logged in");
    start_session(&state, &ctx, jar, user.id).await
}

pub async fn logout(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<Empty>)> {
    state.sessions.revoke(&ctx, &user.session_id).await?;
    info!(user_id = %user.user_id, "User logged out");
    Ok((jar.remove(expired_session_cookie()), Json(Empty {})))
}

/// Revoke every session of the caller, this one included
pub async fn logout_everywhere(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<DeletedCount>)> {
    let deleted = state.sessions.revoke_all(&ctx, user.user_id).await?;
    info!(user_id = %user.user_id, deleted, "All sessions revoked");
    Ok((
        jar.remove(expired_session_cookie()),
        Json(DeletedCount { deleted }),
    ))
}

/// Token for the `X-CSRF-Token` header of this session's mutating requests
pub async fn csrf_token(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<([(&'static str, String); 1], Json<Empty>)> {
    let token = state
        .csrf
        .issue(&user.session_id, user.user_id)
        .map_err(ApiError::internal)?;
    Ok(([(CSRF_HEADER, token)], Json(Empty {})))
}

pub async fn me(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<Profile>> {
    let account = state
        .users
        .find_by_id(user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(account.into()))
}

pub async fn public_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<PublicProfile>> {
    let account = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(account.into()))
}

pub async fn update_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
    RpcJson(update): RpcJson<ProfileUpdate>,
) -> ApiResult<Json<Profile>> {
    if let Some(username) = &update.username {
        validate_username(username)?;
    }
    if let Some(phone) = &update.phone {
        validate_phone(phone)?;
    }
    if let Some(avatar_id) = update.avatar_id {
        // The avatar must be an image the static service knows about
        let _: StaticUri = state
            .clients
            .media
            .call(&ctx, GET_STATIC, &StaticId { id: avatar_id })
            .await?;
    }

    let account = state
        .users
        .update_profile(user.user_id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    info!(user_id = %user.user_id, "Profile updated");
    Ok(Json(account.into()))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    RpcJson(change): RpcJson<PasswordChange>,
) -> ApiResult<Json<Empty>> {
    let account = state
        .users
        .find_by_id(user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    if !verify_password(&account.password_hash, &change.old_password) {
        return Err(ApiError::bad_request("invalid credentials"));
    }
    validate_password(&change.new_password)?;

    let password_hash = hash_password(&change.new_password).map_err(ApiError::internal)?;
    state
        .users
        .update_password(user.user_id, &password_hash)
        .await?;

    info!(user_id = %user.user_id, "Password changed");
    Ok(Json(Empty {}))
}
