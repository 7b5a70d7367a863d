//! Read side of adverts, categories and price history

use async_trait::async_trait;
use common::{
    database::{decode, with_timeout},
    error::{DatabaseError, DatabaseResult},
    proto::AdvertStatus,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    models::advert::{Advert, Category, PriceChange},
    repositories::AdvertRepository,
};

const ADVERT_COLUMNS: &str = "id, seller_id, category_id, title, description, price, location, \
                              has_delivery, status, image_id, promoted_until, created_at, updated_at";

fn advert_from_row(row: &PgRow) -> DatabaseResult<Advert> {
    Ok(Advert {
        id: row.get("id"),
        seller_id: row.get("seller_id"),
        category_id: row.get("category_id"),
        title: row.get("title"),
        description: row.get("description"),
        price: row.get("price"),
        location: row.get("location"),
        has_delivery: row.get("has_delivery"),
        status: decode(row.get::<&str, _>("status"))?,
        image_id: row.get("image_id"),
        promoted_until: row.get("promoted_until"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[derive(Clone)]
pub struct PgAdvertRepository {
    pool: PgPool,
    call_timeout: Duration,
}

impl PgAdvertRepository {
    pub fn new(pool: PgPool, call_timeout: Duration) -> Self {
        Self { pool, call_timeout }
    }
}

#[async_trait]
impl AdvertRepository for PgAdvertRepository {
    async fn list(&self, limit: i64, offset: i64) -> DatabaseResult<Vec<Advert>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM adverts
            WHERE status <> $1
            ORDER BY (promoted_until IS NOT NULL AND promoted_until > NOW()) DESC,
                     created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            ADVERT_COLUMNS
        );
        let rows = with_timeout(self.call_timeout, async {
            sqlx::query(&sql)
                .bind(AdvertStatus::Inactive.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(DatabaseError::Query)
        })
        .await?;

        rows.iter().map(advert_from_row).collect()
    }

    async fn get(&self, id: Uuid) -> DatabaseResult<Option<Advert>> {
        let sql = format!("SELECT {} FROM adverts WHERE id = $1", ADVERT_COLUMNS);
        let row = with_timeout(self.call_timeout, async {
            sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::Query)
        })
        .await?;

        row.as_ref().map(advert_from_row).transpose()
    }

    async fn owner(&self, advert_id: Uuid) -> DatabaseResult<Option<Uuid>> {
        let row = with_timeout(self.call_timeout, async {
            sqlx::query(
                r#"
                SELECT s.user_id
                FROM adverts a
                JOIN sellers s ON s.id = a.seller_id
                WHERE a.id = $1
                "#,
            )
            .bind(advert_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)
        })
        .await?;

        Ok(row.map(|row| row.get("user_id")))
    }

    async fn by_seller(&self, seller_id: Uuid) -> DatabaseResult<Vec<Advert>> {
        let sql = format!(
            "SELECT {} FROM adverts WHERE seller_id = $1 ORDER BY created_at DESC",
            ADVERT_COLUMNS
        );
        let rows = with_timeout(self.call_timeout, async {
            sqlx::query(&sql)
                .bind(seller_id)
                .fetch_all(&self.pool)
                .await
                .map_err(DatabaseError::Query)
        })
        .await?;

        rows.iter().map(advert_from_row).collect()
    }

    async fn categories(&self) -> DatabaseResult<Vec<Category>> {
        let rows = with_timeout(self.call_timeout, async {
            sqlx::query("SELECT id, title FROM categories ORDER BY title")
                .fetch_all(&self.pool)
                .await
                .map_err(DatabaseError::Query)
        })
        .await?;

        Ok(rows
            .iter()
            .map(|row| Category {
                id: row.get("id"),
                title: row.get("title"),
            })
            .collect())
    }

    async fn price_history(&self, advert_id: Uuid) -> DatabaseResult<Vec<PriceChange>> {
        let rows = with_timeout(self.call_timeout, async {
            sqlx::query(
                r#"
                SELECT advert_id, old_price, new_price, changed_at
                FROM price_history
                WHERE advert_id = $1
                ORDER BY changed_at
                "#,
            )
            .bind(advert_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)
        })
        .await?;

        Ok(rows
            .iter()
            .map(|row| PriceChange {
                advert_id: row.get("advert_id"),
                old_price: row.get("old_price"),
                new_price: row.get("new_price"),
                changed_at: row.get("changed_at"),
            })
            .collect())
    }
}
