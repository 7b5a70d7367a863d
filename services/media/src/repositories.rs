//! Media table access

use async_trait::async_trait;
use common::{
    database::with_timeout,
    error::{DatabaseError, DatabaseResult},
};
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::storage::StoredFile;

#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Register a stored file and return its generated id
    async fn insert(&self, stored: &StoredFile) -> DatabaseResult<Uuid>;

    async fn get(&self, id: Uuid) -> DatabaseResult<Option<StoredFile>>;

    async fn ping(&self) -> DatabaseResult<()>;
}

#[derive(Clone)]
pub struct PgMediaRepository {
    pool: PgPool,
    call_timeout: Duration,
}

impl PgMediaRepository {
    pub fn new(pool: PgPool, call_timeout: Duration) -> Self {
        Self { pool, call_timeout }
    }
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    async fn insert(&self, stored: &StoredFile) -> DatabaseResult<Uuid> {
        with_timeout(self.call_timeout, async {
            sqlx::query_scalar("INSERT INTO media (path, filename) VALUES ($1, $2) RETURNING id")
                .bind(&stored.path)
                .bind(&stored.filename)
                .fetch_one(&self.pool)
                .await
                .map_err(DatabaseError::Query)
        })
        .await
    }

    async fn get(&self, id: Uuid) -> DatabaseResult<Option<StoredFile>> {
        with_timeout(self.call_timeout, async {
            let row = sqlx::query("SELECT path, filename FROM media WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::Query)?;

            Ok(row.map(|row| StoredFile {
                path: row.get("path"),
                filename: row.get("filename"),
            }))
        })
        .await
    }

    async fn ping(&self) -> DatabaseResult<()> {
        with_timeout(self.call_timeout, async {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(DatabaseError::Query)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::{
        collections::HashMap,
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
    };
    use tokio::sync::RwLock;

    #[derive(Clone, Default)]
    pub struct MemoryMediaRepository {
        rows: Arc<RwLock<HashMap<Uuid, StoredFile>>>,
        failing: Arc<AtomicBool>,
    }

    impl MemoryMediaRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every following insert fail
        pub fn fail_inserts(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        pub async fn len(&self) -> usize {
            self.rows.read().await.len()
        }
    }

    #[async_trait]
    impl MediaRepository for MemoryMediaRepository {
        async fn insert(&self, stored: &StoredFile) -> DatabaseResult<Uuid> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DatabaseError::Timeout(Duration::from_secs(5)));
            }
            let id = Uuid::new_v4();
            self.rows.write().await.insert(id, stored.clone());
            Ok(id)
        }

        async fn get(&self, id: Uuid) -> DatabaseResult<Option<StoredFile>> {
            Ok(self.rows.read().await.get(&id).cloned())
        }

        async fn ping(&self) -> DatabaseResult<()> {
            Ok(())
        }
    }
}
