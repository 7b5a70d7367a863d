//! Auth service surface

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SERVICE: &str = "auth";

pub const CREATE_SESSION: &str = "CreateSession";
pub const GET_USER_ID_BY_SESSION: &str = "GetUserIDBySession";
pub const DELETE_SESSION: &str = "DeleteSession";
pub const LIST_SESSIONS: &str = "ListSessions";
pub const DELETE_ALL_SESSIONS: &str = "DeleteAllSessions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserId {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionList {
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedCount {
    pub deleted: u64,
}
