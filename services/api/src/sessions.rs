//! Gateway view of the auth service

use async_trait::async_trait;
use common::{
    context::RequestContext,
    error::ServiceError,
    proto::{
        Empty,
        auth::{
            CREATE_SESSION, CreateSessionRequest, DELETE_ALL_SESSIONS, DELETE_SESSION,
            DeletedCount, GET_USER_ID_BY_SESSION, SessionToken, UserId,
        },
    },
    rpc::RpcClient,
};
use uuid::Uuid;

#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn create(&self, ctx: &RequestContext, user_id: Uuid) -> Result<String, ServiceError>;

    /// User owning `token`; `NotFound` when the token is not live
    async fn resolve(&self, ctx: &RequestContext, token: &str) -> Result<Uuid, ServiceError>;

    async fn revoke(&self, ctx: &RequestContext, token: &str) -> Result<(), ServiceError>;

    async fn revoke_all(&self, ctx: &RequestContext, user_id: Uuid) -> Result<u64, ServiceError>;
}

/// Sessions held by the auth service
#[derive(Clone)]
pub struct RpcSessions {
    client: RpcClient,
}

impl RpcSessions {
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionBackend for RpcSessions {
    async fn create(&self, ctx: &RequestContext, user_id: Uuid) -> Result<String, ServiceError> {
        let token: SessionToken = self
            .client
            .call(ctx, CREATE_SESSION, &CreateSessionRequest { user_id })
            .await?;
        Ok(token.token)
    }

    async fn resolve(&self, ctx: &RequestContext, token: &str) -> Result<Uuid, ServiceError> {
        let user: UserId = self
            .client
            .call(
                ctx,
                GET_USER_ID_BY_SESSION,
                &SessionToken {
                    token: token.to_string(),
                },
            )
            .await?;
        Ok(user.user_id)
    }

    async fn revoke(&self, ctx: &RequestContext, token: &str) -> Result<(), ServiceError> {
        let _: Empty = self
            .client
            .call(
                ctx,
                DELETE_SESSION,
                &SessionToken {
                    token: token.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    async fn revoke_all(&self, ctx: &RequestContext, user_id: Uuid) -> Result<u64, ServiceError> {
        let deleted: DeletedCount = self
            .client
            .call(ctx, DELETE_ALL_SESSIONS, &UserId { user_id })
            .await?;
        Ok(deleted.deleted)
    }
}
