//! Repositories for gateway-owned storage: accounts, advert reads, orders

use async_trait::async_trait;
use common::{error::DatabaseResult, proto::OrderStatus};
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    ProfileUpdate, User,
    advert::{Advert, Category, PriceChange},
    payment::Order,
};

pub mod adverts;
#[cfg(test)]
pub mod memory;
pub mod orders;
pub mod users;

pub use adverts::PgAdvertRepository;
pub use orders::PgOrderRepository;
pub use users::PgUserRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new account. `None` when the email is already registered.
    async fn create(&self, email: &str, password_hash: &str) -> DatabaseResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>>;

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> DatabaseResult<Option<User>>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> DatabaseResult<bool>;
}

#[async_trait]
pub trait AdvertRepository: Send + Sync {
    /// Visible adverts, promoted ones first, then newest first
    async fn list(&self, limit: i64, offset: i64) -> DatabaseResult<Vec<Advert>>;

    async fn get(&self, id: Uuid) -> DatabaseResult<Option<Advert>>;

    /// User id of the seller owning `advert_id`
    async fn owner(&self, advert_id: Uuid) -> DatabaseResult<Option<Uuid>>;

    async fn by_seller(&self, seller_id: Uuid) -> DatabaseResult<Vec<Advert>>;

    async fn categories(&self) -> DatabaseResult<Vec<Category>>;

    async fn price_history(&self, advert_id: Uuid) -> DatabaseResult<Vec<PriceChange>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> DatabaseResult<()>;

    /// Orders still waiting for the provider's verdict
    async fn in_process(&self) -> DatabaseResult<Vec<Order>>;

    /// Move an `in_process` order to `status`. When `promote` is given the
    /// advert's promotion is extended in the same transaction. Returns
    /// `false` if the order was already terminal, in which case nothing
    /// changes.
    async fn finish(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        promote: Option<(Uuid, Duration)>,
    ) -> DatabaseResult<bool>;
}
