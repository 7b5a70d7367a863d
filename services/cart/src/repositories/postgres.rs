//! PostgreSQL cart repository

use async_trait::async_trait;
use chrono::Utc;
use common::{
    database::{self, decode, with_timeout},
    error::DatabaseError,
    proto::{
        AdvertStatus, CartStatus, PurchaseStatus,
        cart::{AddPurchaseRequest, AdvertSnapshot, Cart, Purchase},
    },
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::{
    checkout::{self, CartHeader},
    error::{CartError, CartResult},
    repositories::CartRepository,
};

fn query_err(e: sqlx::Error) -> CartError {
    CartError::Database(DatabaseError::Query(e))
}

fn advert_from_row(row: &PgRow) -> CartResult<AdvertSnapshot> {
    Ok(AdvertSnapshot {
        id: row.get("id"),
        seller_id: row.get("seller_id"),
        title: row.get("title"),
        price: row.get("price"),
        image_id: row.get("image_id"),
        status: decode(row.get::<&str, _>("status"))?,
    })
}

fn header_from_row(row: &PgRow) -> CartResult<CartHeader> {
    Ok(CartHeader {
        id: row.get("id"),
        user_id: row.get("user_id"),
        status: decode(row.get::<&str, _>("status"))?,
    })
}

/// Adverts of a cart in id order. With `lock`, each advert row is locked
/// for the rest of the transaction.
async fn load_items(
    conn: &mut PgConnection,
    cart_id: Uuid,
    lock: bool,
) -> CartResult<Vec<AdvertSnapshot>> {
    let sql = if lock {
        r#"
        SELECT a.id, a.seller_id, a.title, a.price, a.image_id, a.status
        FROM cart_adverts ca
        JOIN adverts a ON a.id = ca.advert_id
        WHERE ca.cart_id = $1
        ORDER BY a.id
        FOR UPDATE OF a
        "#
    } else {
        r#"
        SELECT a.id, a.seller_id, a.title, a.price, a.image_id, a.status
        FROM cart_adverts ca
        JOIN adverts a ON a.id = ca.advert_id
        WHERE ca.cart_id = $1
        ORDER BY a.id
        "#
    };

    let rows = sqlx::query(sql)
        .bind(cart_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(query_err)?;

    rows.iter().map(advert_from_row).collect()
}

async fn load_cart(conn: &mut PgConnection, header: CartHeader) -> CartResult<Cart> {
    let adverts = load_items(conn, header.id, false).await?;
    Ok(Cart {
        id: header.id,
        user_id: header.user_id,
        status: header.status,
        adverts,
    })
}

async fn active_header(conn: &mut PgConnection, user_id: Uuid) -> CartResult<Option<CartHeader>> {
    sqlx::query("SELECT id, user_id, status FROM carts WHERE user_id = $1 AND status = $2")
        .bind(user_id)
        .bind(CartStatus::Active.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_err)?
        .as_ref()
        .map(header_from_row)
        .transpose()
}

/// Cart repository for database operations
#[derive(Clone)]
pub struct PgCartRepository {
    pool: PgPool,
    call_timeout: Duration,
}

impl PgCartRepository {
    pub fn new(pool: PgPool, call_timeout: Duration) -> Self {
        Self { pool, call_timeout }
    }

    async fn acquire(&self) -> CartResult<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| CartError::Database(DatabaseError::Connection(e)))
    }

    async fn checkout(&self, request: &AddPurchaseRequest) -> CartResult<Vec<Purchase>> {
        let mut tx = database::begin(&self.pool).await?;

        let header = sqlx::query("SELECT id, user_id, status FROM carts WHERE id = $1 FOR UPDATE")
            .bind(request.cart_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err)?
            .as_ref()
            .map(header_from_row)
            .transpose()?
            .ok_or(CartError::CartNotFound)?;

        let items = load_items(&mut tx, header.id, true).await?;
        checkout::validate(&header, request.user_id, &items)?;

        let created_at = Utc::now();
        let mut purchases = Vec::new();

        for (seller_id, adverts) in checkout::group_by_seller(&items) {
            let id = Uuid::new_v4();

            sqlx::query(
                r#"
                INSERT INTO purchases
                    (id, cart_id, customer_id, seller_id, address,
                     payment_method, delivery_method, status, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(id)
            .bind(header.id)
            .bind(request.user_id)
            .bind(seller_id)
            .bind(&request.address)
            .bind(request.payment_method.as_str())
            .bind(request.delivery_method.as_str())
            .bind(PurchaseStatus::Pending.as_str())
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

            let advert_ids: Vec<Uuid> = adverts.iter().map(|a| a.id).collect();
            sqlx::query(
                "INSERT INTO purchase_adverts (purchase_id, advert_id) SELECT $1, UNNEST($2::uuid[])",
            )
            .bind(id)
            .bind(advert_ids)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

            purchases.push(Purchase {
                id,
                cart_id: header.id,
                customer_id: request.user_id,
                seller_id,
                address: request.address.clone(),
                payment_method: request.payment_method,
                delivery_method: request.delivery_method,
                status: PurchaseStatus::Pending,
                adverts,
                created_at,
            });
        }

        sqlx::query("UPDATE carts SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(header.id)
            .bind(CartStatus::Inactive.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        let advert_ids: Vec<Uuid> = items.iter().map(|a| a.id).collect();
        sqlx::query("UPDATE adverts SET status = $2, updated_at = NOW() WHERE id = ANY($1)")
            .bind(advert_ids)
            .bind(AdvertStatus::Reserved.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        database::commit(tx).await?;

        info!(
            cart_id = %header.id,
            purchases = purchases.len(),
            "Cart checked out"
        );
        Ok(purchases)
    }

    async fn add_to_cart(&self, user_id: Uuid, advert_id: Uuid) -> CartResult<Cart> {
        let mut tx = database::begin(&self.pool).await?;

        // Held until commit so a concurrent checkout cannot reserve the advert
        // between this check and the cart insert
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM adverts WHERE id = $1 FOR SHARE")
                .bind(advert_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(query_err)?;
        let status: AdvertStatus = decode(&status.ok_or(CartError::AdvertNotFound(advert_id))?)?;
        if status != AdvertStatus::Active {
            return Err(CartError::AdvertUnavailable(advert_id));
        }

        // The partial unique index on active carts keeps this at one per user
        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) WHERE status = 'active' DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(CartStatus::Active.as_str())
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        let header = active_header(&mut tx, user_id)
            .await?
            .ok_or(CartError::CartNotFound)?;

        sqlx::query(
            "INSERT INTO cart_adverts (cart_id, advert_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(header.id)
        .bind(advert_id)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        let cart = load_cart(&mut tx, header).await?;
        database::commit(tx).await?;
        Ok(cart)
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn add_purchase(&self, request: &AddPurchaseRequest) -> CartResult<Vec<Purchase>> {
        with_timeout(self.call_timeout, self.checkout(request)).await
    }

    async fn purchases_by_user(&self, user_id: Uuid) -> CartResult<Vec<Purchase>> {
        with_timeout(self.call_timeout, async {
            let rows = sqlx::query(
                r#"
                SELECT p.id AS purchase_id, p.cart_id, p.customer_id,
                       p.seller_id AS purchase_seller_id, p.address, p.payment_method,
                       p.delivery_method, p.status AS purchase_status, p.created_at,
                       a.id, a.seller_id, a.title, a.price, a.image_id, a.status
                FROM purchases p
                JOIN purchase_adverts pa ON pa.purchase_id = p.id
                JOIN adverts a ON a.id = pa.advert_id
                WHERE p.customer_id = $1
                ORDER BY p.created_at DESC, p.id, a.id
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;

            let mut purchases: Vec<Purchase> = Vec::new();
            for row in &rows {
                let advert = advert_from_row(row)?;
                let purchase_id: Uuid = row.get("purchase_id");

                match purchases.last_mut() {
                    Some(last) if last.id == purchase_id => last.adverts.push(advert),
                    _ => purchases.push(Purchase {
                        id: purchase_id,
                        cart_id: row.get("cart_id"),
                        customer_id: row.get("customer_id"),
                        seller_id: row.get("purchase_seller_id"),
                        address: row.get("address"),
                        payment_method: decode(row.get::<&str, _>("payment_method"))?,
                        delivery_method: decode(row.get::<&str, _>("delivery_method"))?,
                        status: decode(row.get::<&str, _>("purchase_status"))?,
                        adverts: vec![advert],
                        created_at: row.get("created_at"),
                    }),
                }
            }

            Ok(purchases)
        })
        .await
    }

    async fn cart_by_id(&self, cart_id: Uuid) -> CartResult<Cart> {
        with_timeout(self.call_timeout, async {
            let mut conn = self.acquire().await?;

            let header = sqlx::query("SELECT id, user_id, status FROM carts WHERE id = $1")
                .bind(cart_id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(query_err)?
                .as_ref()
                .map(header_from_row)
                .transpose()?
                .ok_or(CartError::CartNotFound)?;

            load_cart(&mut conn, header).await
        })
        .await
    }

    async fn active_cart(&self, user_id: Uuid) -> CartResult<Cart> {
        with_timeout(self.call_timeout, async {
            let mut conn = self.acquire().await?;
            let header = active_header(&mut conn, user_id)
                .await?
                .ok_or(CartError::CartNotFound)?;
            load_cart(&mut conn, header).await
        })
        .await
    }

    async fn active_cart_id(&self, user_id: Uuid) -> CartResult<Option<Uuid>> {
        with_timeout(self.call_timeout, async {
            let mut conn = self.acquire().await?;
            Ok(active_header(&mut conn, user_id).await?.map(|h| h.id))
        })
        .await
    }

    async fn add_advert(&self, user_id: Uuid, advert_id: Uuid) -> CartResult<Cart> {
        with_timeout(self.call_timeout, self.add_to_cart(user_id, advert_id)).await
    }

    async fn remove_advert(&self, user_id: Uuid, advert_id: Uuid) -> CartResult<Cart> {
        with_timeout(self.call_timeout, async {
            let mut conn = self.acquire().await?;
            let header = active_header(&mut conn, user_id)
                .await?
                .ok_or(CartError::CartNotFound)?;

            let result = sqlx::query("DELETE FROM cart_adverts WHERE cart_id = $1 AND advert_id = $2")
                .bind(header.id)
                .bind(advert_id)
                .execute(&mut *conn)
                .await
                .map_err(query_err)?;

            if result.rows_affected() == 0 {
                return Err(CartError::NotInCart(advert_id));
            }

            load_cart(&mut conn, header).await
        })
        .await
    }

    async fn ping(&self) -> CartResult<()> {
        with_timeout(self.call_timeout, async {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(query_err)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    //! Run against a database with the marketplace schema loaded:
    //! `cargo test -p cart -- --ignored`.

    use super::*;
    use common::{
        database::{DatabaseConfig, init_pool},
        proto::{DeliveryMethod, PaymentMethod},
    };
    use std::error::Error;

    async fn repository() -> Result<PgCartRepository, Box<dyn Error>> {
        let config = DatabaseConfig::from_env()?;
        let pool = init_pool(&config).await?;
        Ok(PgCartRepository::new(pool, config.call_timeout()))
    }

    async fn seed_user(pool: &PgPool) -> Result<Uuid, Box<dyn Error>> {
        let id = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash) VALUES ($1, 'x') RETURNING id",
        )
        .bind(format!("{}@cart.test", Uuid::new_v4().simple()))
        .fetch_one(pool)
        .await?;
        Ok(id)
    }

    async fn seed_advert(pool: &PgPool, seller_id: Uuid, price: i64) -> Result<Uuid, Box<dyn Error>> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO adverts (id, seller_id, title, price, status) VALUES ($1, $2, $3, $4, $5)")
            .bind(id)
            .bind(seller_id)
            .bind("Integration advert")
            .bind(price)
            .bind(AdvertStatus::Active.as_str())
            .execute(pool)
            .await?;
        Ok(id)
    }

    fn purchase(cart_id: Uuid, user_id: Uuid) -> AddPurchaseRequest {
        AddPurchaseRequest {
            cart_id,
            user_id,
            address: "1 Market Street".to_string(),
            payment_method: PaymentMethod::Card,
            delivery_method: DeliveryMethod::Pickup,
        }
    }

    #[tokio::test]
    #[ignore = "requires running postgres"]
    async fn test_checkout_splits_by_seller_and_reserves() -> Result<(), Box<dyn Error>> {
        let repo = repository().await?;
        let buyer = seed_user(&repo.pool).await?;
        let (alice, bob) = (seed_user(&repo.pool).await?, seed_user(&repo.pool).await?);
        let sofa = seed_advert(&repo.pool, alice, 12_000).await?;
        let lamp = seed_advert(&repo.pool, alice, 900).await?;
        let bike = seed_advert(&repo.pool, bob, 30_000).await?;

        repo.add_advert(buyer, sofa).await?;
        repo.add_advert(buyer, lamp).await?;
        let cart = repo.add_advert(buyer, bike).await?;
        // Adding twice keeps one row
        let again = repo.add_advert(buyer, bike).await?;
        assert_eq!(again.id, cart.id);
        assert_eq!(again.adverts.len(), 3);
        assert_eq!(cart.adverts.len(), 3);
        assert_eq!(repo.active_cart_id(buyer).await?, Some(cart.id));

        let purchases = repo.add_purchase(&purchase(cart.id, buyer)).await?;
        assert_eq!(purchases.len(), 2);
        let total: usize = purchases.iter().map(|p| p.adverts.len()).sum();
        assert_eq!(total, 3);

        let stored = repo.cart_by_id(cart.id).await?;
        assert_eq!(stored.status, CartStatus::Inactive);
        assert!(stored.adverts.iter().all(|a| a.status == AdvertStatus::Reserved));
        assert_eq!(repo.active_cart_id(buyer).await?, None);

        let history = repo.purchases_by_user(buyer).await?;
        assert_eq!(history.len(), 2);

        // A reserved advert can no longer be put in a cart
        let other = seed_user(&repo.pool).await?;
        assert!(matches!(
            repo.add_advert(other, sofa).await,
            Err(CartError::AdvertUnavailable(id)) if id == sofa
        ));

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires running postgres"]
    async fn test_second_checkout_of_same_cart_is_rejected() -> Result<(), Box<dyn Error>> {
        let repo = repository().await?;
        let buyer = seed_user(&repo.pool).await?;
        let seller = seed_user(&repo.pool).await?;
        let advert = seed_advert(&repo.pool, seller, 5_000).await?;

        let cart = repo.add_advert(buyer, advert).await?;
        repo.add_purchase(&purchase(cart.id, buyer)).await?;

        assert!(matches!(
            repo.add_purchase(&purchase(cart.id, buyer)).await,
            Err(CartError::CartInactive)
        ));
        assert_eq!(repo.purchases_by_user(buyer).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires running postgres"]
    async fn test_concurrent_checkouts_commit_once() -> Result<(), Box<dyn Error>> {
        let repo = repository().await?;
        let buyer = seed_user(&repo.pool).await?;
        let seller = seed_user(&repo.pool).await?;
        let advert = seed_advert(&repo.pool, seller, 7_500).await?;
        let cart = repo.add_advert(buyer, advert).await?;

        let request = purchase(cart.id, buyer);
        let (first, second) = tokio::join!(repo.add_purchase(&request), repo.add_purchase(&request));

        let committed = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1);
        assert!(
            [first, second]
                .into_iter()
                .any(|r| matches!(r, Err(CartError::CartInactive)))
        );

        Ok(())
    }
}
