//! Repositories for cart and purchase storage

use async_trait::async_trait;
use common::proto::cart::{AddPurchaseRequest, Cart, Purchase};
use uuid::Uuid;

use crate::error::CartResult;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgCartRepository;

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Convert the user's active cart into purchases, one per seller, in a
    /// single transaction. The cart becomes inactive and its adverts reserved.
    async fn add_purchase(&self, request: &AddPurchaseRequest) -> CartResult<Vec<Purchase>>;

    /// Every purchase made by `user_id`, newest first, with advert snapshots
    async fn purchases_by_user(&self, user_id: Uuid) -> CartResult<Vec<Purchase>>;

    async fn cart_by_id(&self, cart_id: Uuid) -> CartResult<Cart>;

    /// The user's active cart
    async fn active_cart(&self, user_id: Uuid) -> CartResult<Cart>;

    /// Id of the user's active cart, if any
    async fn active_cart_id(&self, user_id: Uuid) -> CartResult<Option<Uuid>>;

    /// Add an active advert to the user's cart, creating the cart on first use.
    /// Adding an advert that is already present is a no-op.
    async fn add_advert(&self, user_id: Uuid, advert_id: Uuid) -> CartResult<Cart>;

    async fn remove_advert(&self, user_id: Uuid, advert_id: Uuid) -> CartResult<Cart>;

    async fn ping(&self) -> CartResult<()>;
}
