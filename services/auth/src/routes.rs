//! Authentication service routes

use axum::{Json, Router, extract::State, routing::post};
use common::{
    context::RequestContext,
    error::ServiceError,
    metrics::Metrics,
    proto::{
        Empty, PING,
        auth::{
            CREATE_SESSION, CreateSessionRequest, DELETE_ALL_SESSIONS, DELETE_SESSION,
            DeletedCount, GET_USER_ID_BY_SESSION, LIST_SESSIONS, SERVICE, SessionList,
            SessionToken, UserId,
        },
    },
    rpc::{RpcJson, health_router, rpc_path, with_common_layers},
};
use std::sync::Arc;
use tracing::{error, info};

use crate::session::{SessionError, SessionStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => ServiceError::NotFound("session not found".to_string()),
            other => {
                error!("Session store failure: {}", other);
                ServiceError::internal(other)
            }
        }
    }
}

/// Create the router for the authentication service
pub fn create_router(state: AppState, metrics: Arc<Metrics>) -> Router {
    let rpc = Router::new()
        .route(&rpc_path(SERVICE, CREATE_SESSION), post(create_session))
        .route(&rpc_path(SERVICE, GET_USER_ID_BY_SESSION), post(get_user_id))
        .route(&rpc_path(SERVICE, DELETE_SESSION), post(delete_session))
        .route(&rpc_path(SERVICE, LIST_SESSIONS), post(list_sessions))
        .route(&rpc_path(SERVICE, DELETE_ALL_SESSIONS), post(delete_all_sessions))
        .route(&rpc_path(SERVICE, PING), post(ping))
        .with_state(state);

    with_common_layers(rpc.merge(health_router(SERVICE)), metrics)
}

pub async fn create_session(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<CreateSessionRequest>,
) -> Result<Json<SessionToken>, ServiceError> {
    let token = state.sessions.create(payload.user_id).await?;
    Ok(Json(SessionToken { token }))
}

pub async fn get_user_id(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<SessionToken>,
) -> Result<Json<UserId>, ServiceError> {
    let user_id = state.sessions.get(&payload.token).await?;
    Ok(Json(UserId { user_id }))
}

pub async fn delete_session(
    State(state): State<AppState>,
    ctx: RequestContext,
    RpcJson(payload): RpcJson<SessionToken>,
) -> Result<Json<Empty>, ServiceError> {
    state.sessions.delete(&payload.token).await?;
    info!(request_id = %ctx.request_id, "Session deleted");
    Ok(Json(Empty {}))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<UserId>,
) -> Result<Json<SessionList>, ServiceError> {
    let tokens = state.sessions.list(payload.user_id).await?;
    Ok(Json(SessionList { tokens }))
}

pub async fn delete_all_sessions(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<UserId>,
) -> Result<Json<DeletedCount>, ServiceError> {
    let deleted = state.sessions.delete_all(payload.user_id).await?;
    Ok(Json(DeletedCount { deleted }))
}

pub async fn ping(State(state): State<AppState>) -> Result<Json<Empty>, ServiceError> {
    if state.sessions.health_check().await? {
        Ok(Json(Empty {}))
    } else {
        Err(ServiceError::Internal("session store unreachable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use common::{cache::MemoryStore, error::ErrorBody};
    use prometheus::Registry;
    use serde::{Serialize, de::DeserializeOwned};
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app() -> (Router, Arc<Metrics>) {
        let registry = Registry::new();
        let metrics = Arc::new(Metrics::new(&registry, "auth", SERVICE).unwrap());
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        (create_router(AppState { sessions }, metrics.clone()), metrics)
    }

    async fn call<T: Serialize>(app: &Router, method: &str, body: &T) -> (StatusCode, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(rpc_path(SERVICE, method))
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 16)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (app, metrics) = app();
        let user_id = Uuid::new_v4();

        let (status, body) = call(&app, CREATE_SESSION, &CreateSessionRequest { user_id }).await;
        assert_eq!(status, StatusCode::OK);
        let token: SessionToken = parse(&body);

        let (status, body) = call(&app, GET_USER_ID_BY_SESSION, &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<UserId>(&body).user_id, user_id);

        let (status, _) = call(&app, DELETE_SESSION, &token).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, GET_USER_ID_BY_SESSION, &token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(parse::<ErrorBody>(&body).error, "not_found");

        assert_eq!(metrics.hit_count(GET_USER_ID_BY_SESSION), 2);
        assert_eq!(metrics.error_count(GET_USER_ID_BY_SESSION), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_session_succeeds() {
        let (app, _) = app();
        let token = SessionToken {
            token: "never-issued".to_string(),
        };

        let (status, _) = call(&app, DELETE_SESSION, &token).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bulk_logout() {
        let (app, _) = app();
        let user_id = Uuid::new_v4();

        for _ in 0..3 {
            call(&app, CREATE_SESSION, &CreateSessionRequest { user_id }).await;
        }

        let (_, body) = call(&app, LIST_SESSIONS, &UserId { user_id }).await;
        assert_eq!(parse::<SessionList>(&body).tokens.len(), 3);

        let (status, body) = call(&app, DELETE_ALL_SESSIONS, &UserId { user_id }).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<DeletedCount>(&body).deleted, 3);

        let (_, body) = call(&app, LIST_SESSIONS, &UserId { user_id }).await;
        assert!(parse::<SessionList>(&body).tokens.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_user_id_is_bad_request() {
        let (app, _) = app();
        let (status, body) = call(
            &app,
            CREATE_SESSION,
            &serde_json::json!({ "user_id": "nope" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(parse::<ErrorBody>(&body).error, "bad_request");
    }

    #[tokio::test]
    async fn test_ping() {
        let (app, _) = app();
        let (status, _) = call(&app, PING, &Empty {}).await;
        assert_eq!(status, StatusCode::OK);
    }
}
