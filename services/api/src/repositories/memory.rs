//! In-memory gateway storage used by the handler and worker tests

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use common::{error::DatabaseResult, proto::{AdvertStatus, OrderStatus}};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    models::{
        ProfileUpdate, User,
        advert::{Advert, Category, PriceChange},
        payment::Order,
    },
    repositories::{AdvertRepository, OrderRepository, UserRepository},
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    adverts: HashMap<Uuid, Advert>,
    /// seller id -> user id
    sellers: HashMap<Uuid, Uuid>,
    categories: Vec<Category>,
    history: Vec<PriceChange>,
    orders: HashMap<Uuid, Order>,
}

#[derive(Clone, Default)]
pub struct MemoryDb {
    state: Arc<Mutex<State>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an active advert owned by `owner`, returning its id
    pub async fn seed_advert(&self, owner: Uuid, title: &str, price: i64) -> Uuid {
        let mut state = self.state.lock().await;
        let seller_id = match state.sellers.iter().find(|(_, user)| **user == owner) {
            Some((seller, _)) => *seller,
            None => {
                let seller = Uuid::new_v4();
                state.sellers.insert(seller, owner);
                seller
            }
        };

        let now = Utc::now();
        let id = Uuid::new_v4();
        state.adverts.insert(
            id,
            Advert {
                id,
                seller_id,
                category_id: Uuid::nil(),
                title: title.to_string(),
                description: String::new(),
                price,
                location: "Moscow".to_string(),
                has_delivery: false,
                status: AdvertStatus::Active,
                image_id: None,
                promoted_until: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub async fn seed_category(&self, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.categories.push(Category {
            id,
            title: title.to_string(),
        });
        id
    }

    pub async fn seed_price_change(&self, advert_id: Uuid, old_price: i64, new_price: i64) {
        self.state.lock().await.history.push(PriceChange {
            advert_id,
            old_price,
            new_price,
            changed_at: Utc::now(),
        });
    }

    pub async fn advert(&self, id: Uuid) -> Option<Advert> {
        self.state.lock().await.adverts.get(&id).cloned()
    }

    pub async fn order(&self, id: Uuid) -> Option<Order> {
        self.state.lock().await.orders.get(&id).cloned()
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.values().cloned().collect()
    }
}

#[async_trait]
impl UserRepository for MemoryDb {
    async fn create(&self, email: &str, password_hash: &str) -> DatabaseResult<Option<User>> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == email) {
            return Ok(None);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            username: None,
            phone: None,
            avatar_id: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(Some(user))
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        Ok(self
            .state
            .lock()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> DatabaseResult<Option<User>> {
        let mut state = self.state.lock().await;
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(username) = &update.username {
            user.username = Some(username.clone());
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(avatar_id) = update.avatar_id {
            user.avatar_id = Some(avatar_id);
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> DatabaseResult<bool> {
        let mut state = self.state.lock().await;
        match state.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AdvertRepository for MemoryDb {
    async fn list(&self, limit: i64, offset: i64) -> DatabaseResult<Vec<Advert>> {
        let now = Utc::now();
        let mut adverts: Vec<Advert> = self
            .state
            .lock()
            .await
            .adverts
            .values()
            .filter(|a| a.status != AdvertStatus::Inactive)
            .cloned()
            .collect();

        adverts.sort_by(|a, b| {
            b.is_promoted(now)
                .cmp(&a.is_promoted(now))
                .then(b.created_at.cmp(&a.created_at))
        });

        Ok(adverts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get(&self, id: Uuid) -> DatabaseResult<Option<Advert>> {
        Ok(self.advert(id).await)
    }

    async fn owner(&self, advert_id: Uuid) -> DatabaseResult<Option<Uuid>> {
        let state = self.state.lock().await;
        Ok(state
            .adverts
            .get(&advert_id)
            .and_then(|a| state.sellers.get(&a.seller_id))
            .copied())
    }

    async fn by_seller(&self, seller_id: Uuid) -> DatabaseResult<Vec<Advert>> {
        let mut adverts: Vec<Advert> = self
            .state
            .lock()
            .await
            .adverts
            .values()
            .filter(|a| a.seller_id == seller_id)
            .cloned()
            .collect();
        adverts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(adverts)
    }

    async fn categories(&self) -> DatabaseResult<Vec<Category>> {
        let mut categories = self.state.lock().await.categories.clone();
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }

    async fn price_history(&self, advert_id: Uuid) -> DatabaseResult<Vec<PriceChange>> {
        Ok(self
            .state
            .lock()
            .await
            .history
            .iter()
            .filter(|h| h.advert_id == advert_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderRepository for MemoryDb {
    async fn insert(&self, order: &Order) -> DatabaseResult<()> {
        self.state
            .lock()
            .await
            .orders
            .insert(order.id, order.clone());
        Ok(())
    }

    async fn in_process(&self) -> DatabaseResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state
            .lock()
            .await
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::InProcess)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn finish(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        promote: Option<(Uuid, Duration)>,
    ) -> DatabaseResult<bool> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        match state.orders.get_mut(&order_id) {
            Some(order) if order.status == OrderStatus::InProcess => {
                order.status = status;
                order.updated_at = now;
            }
            _ => return Ok(false),
        }

        if let Some((advert_id, duration)) = promote {
            if let Some(advert) = state.adverts.get_mut(&advert_id) {
                let base = advert.promoted_until.filter(|until| *until > now).unwrap_or(now);
                let extra = ChronoDuration::from_std(duration).unwrap_or_else(|_| ChronoDuration::zero());
                advert.promoted_until = Some(base + extra);
            }
        }
        Ok(true)
    }
}
