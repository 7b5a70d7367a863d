//! Session authentication and CSRF middleware
//!
//! The session cookie carries an opaque token that the auth service maps to
//! a user id. [`require_auth`] rejects requests without a live session,
//! [`annotate`] only records whether there was one, and [`csrf_guard`]
//! checks the `X-CSRF-Token` header on mutating requests of an
//! authenticated user.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, Method, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use common::{context::RequestContext, error::ServiceError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{csrf::CSRF_HEADER, error::ApiError, state::AppState};

pub const SESSION_COOKIE: &str = "session_id";
pub const AUTHENTICATED_HEADER: &str = "authenticated";

/// The authenticated caller, placed in request extensions by the middleware
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub session_id: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("authentication required"))
    }
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Resolve the session cookie. `Ok(None)` means the caller is anonymous;
/// errors are failures of the auth service itself.
async fn resolve(
    state: &AppState,
    ctx: &RequestContext,
    jar: &CookieJar,
) -> Result<Option<CurrentUser>, ServiceError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };

    match state.sessions.resolve(ctx, cookie.value()).await {
        Ok(user_id) => Ok(Some(CurrentUser {
            user_id,
            session_id: cookie.value().to_string(),
        })),
        Err(ServiceError::NotFound(_) | ServiceError::BadRequest(_)) => {
            debug!("Session cookie is not live");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Deny requests without a live session
pub async fn require_auth(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = resolve(&state, &ctx, &jar)
        .await?
        .ok_or_else(|| ApiError::unauthorized("authentication required"))?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Pass every request through and report `authenticated: true|false`
pub async fn annotate(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let user = match resolve(&state, &ctx, &jar).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Session lookup failed, treating request as anonymous: {}", e);
            None
        }
    };

    let authenticated = user.is_some();
    if let Some(user) = user {
        req.extensions_mut().insert(user);
    }

    let mut response = next.run(req).await;
    response.headers_mut().insert(
        AUTHENTICATED_HEADER,
        HeaderValue::from_static(if authenticated { "true" } else { "false" }),
    );
    response
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    )
}

/// Require a valid CSRF token on mutating requests. Must run after
/// [`require_auth`].
pub async fn csrf_guard(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_mutating(req.method()) {
        return Ok(next.run(req).await);
    }

    let user = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::unauthorized("authentication required"))?;

    let token = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::forbidden("missing CSRF token"))?;

    if let Err(e) = state.csrf.verify(token, &user.session_id, user.user_id) {
        warn!(user_id = %user.user_id, "CSRF check failed: {}", e);
        return Err(ApiError::forbidden("invalid CSRF token"));
    }

    Ok(next.run(req).await)
}
