//! Session management on top of the key-value store
//!
//! Tokens are opaque random strings. Each live session is two records:
//! `session:{token} -> user id` with a TTL, and membership of the token in
//! the set `user-sessions:{user id}`. The set may hold stale tokens after
//! expiry; anything iterating it re-validates each token through [`SessionStore::get`].

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use common::{cache::KeyValueStore, error::CacheError};
use rand::{RngCore, rngs::OsRng};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// 256 bits of entropy per token
const TOKEN_BYTES: usize = 32;

const MAX_TOKEN_ATTEMPTS: usize = 5;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session creation failed: {0}")]
    CreationFailed(String),

    #[error("session not found")]
    NotFound,

    #[error("stored user id is malformed: {0:?}")]
    MalformedId(String),

    #[error("session store error: {0}")]
    Store(#[from] CacheError),
}

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

fn user_sessions_key(user_id: &str) -> String {
    format!("user-sessions:{}", user_id)
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Session manager for handling user sessions
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>, lifetime: Duration) -> Self {
        Self { store, lifetime }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Create a new session for a user and return its token
    pub async fn create(&self, user_id: Uuid) -> Result<String, SessionError> {
        let user = user_id.to_string();

        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let token = generate_token();
            let written = self
                .store
                .set_indexed(
                    &session_key(&token),
                    &user,
                    self.lifetime,
                    &user_sessions_key(&user),
                    &token,
                )
                .await
                .map_err(|e| SessionError::CreationFailed(e.to_string()))?;
            if !written {
                warn!(attempt, "Session token collision, re-rolling");
                continue;
            }

            info!("Created session for user: {}", user_id);
            return Ok(token);
        }

        Err(SessionError::CreationFailed(format!(
            "no free token after {} attempts",
            MAX_TOKEN_ATTEMPTS
        )))
    }

    /// Resolve a token to its user. Expired and unknown tokens are both `NotFound`.
    pub async fn get(&self, token: &str) -> Result<Uuid, SessionError> {
        let value = self
            .store
            .get(&session_key(token))
            .await?
            .ok_or(SessionError::NotFound)?;

        Uuid::parse_str(&value).map_err(|_| SessionError::MalformedId(value))
    }

    /// Delete a session. Unknown tokens succeed without doing anything.
    pub async fn delete(&self, token: &str) -> Result<(), SessionError> {
        let key = session_key(token);
        let Some(owner) = self.store.get(&key).await? else {
            return Ok(());
        };

        self.store
            .delete_indexed(&key, &user_sessions_key(&owner), token)
            .await?;

        info!("Deleted session for user: {}", owner);
        Ok(())
    }

    /// Live tokens of a user. Stale index entries are pruned on the way.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<String>, SessionError> {
        let index = user_sessions_key(&user_id.to_string());
        let mut live = Vec::new();

        for token in self.store.set_members(&index).await? {
            match self.get(&token).await {
                Ok(owner) if owner == user_id => live.push(token),
                Ok(_) | Err(SessionError::NotFound) | Err(SessionError::MalformedId(_)) => {
                    self.store.set_remove(&index, &token).await?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(live)
    }

    /// Delete all sessions for a user (logout from all devices)
    pub async fn delete_all(&self, user_id: Uuid) -> Result<u64, SessionError> {
        let index = user_sessions_key(&user_id.to_string());
        let mut deleted = 0;

        for token in self.list(user_id).await? {
            self.store
                .delete_indexed(&session_key(&token), &index, &token)
                .await?;
            deleted += 1;
        }

        info!("Deleted {} sessions for user: {}", deleted, user_id);
        Ok(deleted)
    }

    /// Get session store health status
    pub async fn health_check(&self) -> Result<bool, SessionError> {
        Ok(self.store.health_check().await?)
    }
}
