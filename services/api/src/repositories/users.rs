//! Account storage and password hashing

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use async_trait::async_trait;
use common::{
    database::with_timeout,
    error::{DatabaseError, DatabaseResult},
};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::{
    models::{ProfileUpdate, User},
    repositories::UserRepository,
};

const USER_COLUMNS: &str =
    "id, email, password_hash, username, phone, avatar_id, created_at, updated_at";

/// Hash a password with a fresh salt
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Check a password against a stored hash; unparseable hashes never match
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        username: row.get("username"),
        phone: row.get("phone"),
        avatar_id: row.get("avatar_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// User repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
    call_timeout: Duration,
}

impl PgUserRepository {
    pub fn new(pool: PgPool, call_timeout: Duration) -> Self {
        Self { pool, call_timeout }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, email: &str, password_hash: &str) -> DatabaseResult<Option<User>> {
        info!("Creating new user");

        let sql = format!(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (email) DO NOTHING
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = with_timeout(self.call_timeout, async {
            sqlx::query(&sql)
                .bind(email)
                .bind(password_hash)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::Query)
        })
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row = with_timeout(self.call_timeout, async {
            sqlx::query(&sql)
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::Query)
        })
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = with_timeout(self.call_timeout, async {
            sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::Query)
        })
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> DatabaseResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                phone = COALESCE($3, phone),
                avatar_id = COALESCE($4, avatar_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = with_timeout(self.call_timeout, async {
            sqlx::query(&sql)
                .bind(id)
                .bind(&update.username)
                .bind(&update.phone)
                .bind(update.avatar_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::Query)
        })
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> DatabaseResult<bool> {
        let result = with_timeout(self.call_timeout, async {
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.pool)
                .await
                .map_err(DatabaseError::Query)
        })
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
