//! Promotion order storage

use async_trait::async_trait;
use common::{
    database::{self, decode, with_timeout},
    error::{DatabaseError, DatabaseResult},
    proto::OrderStatus,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::{models::payment::Order, repositories::OrderRepository};

fn order_from_row(row: &PgRow) -> DatabaseResult<Order> {
    Ok(Order {
        id: row.get("id"),
        payment_id: row.get("payment_id"),
        user_id: row.get("user_id"),
        advert_id: row.get("advert_id"),
        amount: row.get("amount"),
        status: decode(row.get::<&str, _>("status"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
    call_timeout: Duration,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool, call_timeout: Duration) -> Self {
        Self { pool, call_timeout }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(&self, order: &Order) -> DatabaseResult<()> {
        with_timeout(self.call_timeout, async {
            sqlx::query(
                r#"
                INSERT INTO orders (id, payment_id, user_id, advert_id, amount, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(order.id)
            .bind(&order.payment_id)
            .bind(order.user_id)
            .bind(order.advert_id)
            .bind(order.amount)
            .bind(order.status.as_str())
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)
        })
        .await?;

        Ok(())
    }

    async fn in_process(&self) -> DatabaseResult<Vec<Order>> {
        let rows = with_timeout(self.call_timeout, async {
            sqlx::query(
                r#"
                SELECT id, payment_id, user_id, advert_id, amount, status, created_at, updated_at
                FROM orders
                WHERE status = $1
                ORDER BY created_at
                "#,
            )
            .bind(OrderStatus::InProcess.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)
        })
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn finish(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        promote: Option<(Uuid, Duration)>,
    ) -> DatabaseResult<bool> {
        with_timeout(self.call_timeout, async {
            let mut tx = database::begin(&self.pool).await?;

            let updated = sqlx::query(
                "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3",
            )
            .bind(order_id)
            .bind(status.as_str())
            .bind(OrderStatus::InProcess.as_str())
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::Query)?;

            if updated.rows_affected() == 0 {
                return Ok(false);
            }

            if let Some((advert_id, duration)) = promote {
                sqlx::query(
                    r#"
                    UPDATE adverts
                    SET promoted_until = GREATEST(COALESCE(promoted_until, NOW()), NOW())
                                         + make_interval(secs => $2)
                    WHERE id = $1
                    "#,
                )
                .bind(advert_id)
                .bind(duration.as_secs_f64())
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::Query)?;
                info!(%order_id, %advert_id, "Advert promoted");
            }

            database::commit(tx).await?;
            Ok(true)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    //! Run against a database with the marketplace schema loaded:
    //! `cargo test -p api -- --ignored`.

    use super::*;
    use chrono::{DateTime, Utc};
    use common::database::{DatabaseConfig, init_pool};
    use std::error::Error;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    async fn open_order(repo: &PgOrderRepository) -> Result<Order, Box<dyn Error>> {
        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash) VALUES ($1, 'x') RETURNING id",
        )
        .bind(format!("{}@orders.test", Uuid::new_v4().simple()))
        .fetch_one(&repo.pool)
        .await?;

        let advert_id = Uuid::new_v4();
        sqlx::query("INSERT INTO adverts (id, seller_id, title, price, status) VALUES ($1, $2, $3, $4, 'active')")
            .bind(advert_id)
            .bind(user_id)
            .bind("Promoted advert")
            .bind(12_000_i64)
            .execute(&repo.pool)
            .await?;

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            payment_id: format!("pay-{}", Uuid::new_v4().simple()),
            user_id,
            advert_id,
            amount: 50_000,
            status: OrderStatus::InProcess,
            created_at: now,
            updated_at: now,
        };
        repo.insert(&order).await?;
        Ok(order)
    }

    async fn promoted_until(
        repo: &PgOrderRepository,
        advert_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, Box<dyn Error>> {
        Ok(sqlx::query_scalar("SELECT promoted_until FROM adverts WHERE id = $1")
            .bind(advert_id)
            .fetch_one(&repo.pool)
            .await?)
    }

    #[tokio::test]
    #[ignore = "requires running postgres"]
    async fn test_finish_applies_once() -> Result<(), Box<dyn Error>> {
        let config = DatabaseConfig::from_env()?;
        let repo = PgOrderRepository::new(init_pool(&config).await?, config.call_timeout());
        let order = open_order(&repo).await?;

        assert!(repo.in_process().await?.iter().any(|o| o.id == order.id));

        let promote = Some((order.advert_id, WEEK));
        assert!(repo.finish(order.id, OrderStatus::Completed, promote).await?);
        let first = promoted_until(&repo, order.advert_id).await?;
        assert!(first.is_some_and(|until| until > Utc::now()));

        // The second run finds the order already resolved and leaves the advert alone
        assert!(!repo.finish(order.id, OrderStatus::Completed, promote).await?);
        assert!(!repo.finish(order.id, OrderStatus::Canceled, None).await?);
        assert_eq!(promoted_until(&repo, order.advert_id).await?, first);
        assert!(!repo.in_process().await?.iter().any(|o| o.id == order.id));

        Ok(())
    }
}
