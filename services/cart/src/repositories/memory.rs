//! In-memory cart repository used by the handler tests

use async_trait::async_trait;
use chrono::Utc;
use common::proto::{
    AdvertStatus, CartStatus, PurchaseStatus,
    cart::{AddPurchaseRequest, AdvertSnapshot, Cart, Purchase},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    checkout::{self, CartHeader},
    error::{CartError, CartResult},
    repositories::CartRepository,
};

#[derive(Default)]
struct State {
    carts: HashMap<Uuid, (CartHeader, Vec<Uuid>)>,
    adverts: HashMap<Uuid, AdvertSnapshot>,
    purchases: Vec<Purchase>,
}

impl State {
    fn snapshot(&self, header: CartHeader, items: &[Uuid]) -> Cart {
        Cart {
            id: header.id,
            user_id: header.user_id,
            status: header.status,
            adverts: items
                .iter()
                .filter_map(|id| self.adverts.get(id).cloned())
                .collect(),
        }
    }

    fn active_cart_id(&self, user_id: Uuid) -> Option<Uuid> {
        self.carts
            .values()
            .find(|(h, _)| h.user_id == user_id && h.status == CartStatus::Active)
            .map(|(h, _)| h.id)
    }
}

#[derive(Clone, Default)]
pub struct MemoryCartRepository {
    state: Arc<Mutex<State>>,
}

impl MemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_advert(&self, seller_id: Uuid, status: AdvertStatus) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.adverts.insert(
            id,
            AdvertSnapshot {
                id,
                seller_id,
                title: format!("Advert {}", id),
                price: 1000,
                image_id: None,
                status,
            },
        );
        id
    }

    pub async fn seed_cart(&self, user_id: Uuid, status: CartStatus, items: &[Uuid]) -> Uuid {
        let id = Uuid::new_v4();
        let header = CartHeader {
            id,
            user_id,
            status,
        };
        self.state
            .lock()
            .await
            .carts
            .insert(id, (header, items.to_vec()));
        id
    }

    pub async fn advert_status(&self, id: Uuid) -> Option<AdvertStatus> {
        self.state.lock().await.adverts.get(&id).map(|a| a.status)
    }

    pub async fn purchases_for_cart(&self, cart_id: Uuid) -> usize {
        self.state
            .lock()
            .await
            .purchases
            .iter()
            .filter(|p| p.cart_id == cart_id)
            .count()
    }
}

#[async_trait]
impl CartRepository for MemoryCartRepository {
    async fn add_purchase(&self, request: &AddPurchaseRequest) -> CartResult<Vec<Purchase>> {
        let mut state = self.state.lock().await;

        let (header, items) = state
            .carts
            .get(&request.cart_id)
            .cloned()
            .ok_or(CartError::CartNotFound)?;
        let adverts = state.snapshot(header, &items).adverts;

        checkout::validate(&header, request.user_id, &adverts)?;

        let created_at = Utc::now();
        let mut purchases = Vec::new();
        for (seller_id, adverts) in checkout::group_by_seller(&adverts) {
            purchases.push(Purchase {
                id: Uuid::new_v4(),
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

        if let Some((header, _)) = state.carts.get_mut(&request.cart_id) {
            header.status = CartStatus::Inactive;
        }
        for id in &items {
            if let Some(advert) = state.adverts.get_mut(id) {
                advert.status = AdvertStatus::Reserved;
            }
        }
        state.purchases.extend(purchases.iter().cloned());

        Ok(purchases)
    }

    async fn purchases_by_user(&self, user_id: Uuid) -> CartResult<Vec<Purchase>> {
        let state = self.state.lock().await;
        let mut purchases: Vec<Purchase> = state
            .purchases
            .iter()
            .filter(|p| p.customer_id == user_id)
            .cloned()
            .collect();
        purchases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(purchases)
    }

    async fn cart_by_id(&self, cart_id: Uuid) -> CartResult<Cart> {
        let state = self.state.lock().await;
        let (header, items) = state.carts.get(&cart_id).ok_or(CartError::CartNotFound)?;
        Ok(state.snapshot(*header, items))
    }

    async fn active_cart(&self, user_id: Uuid) -> CartResult<Cart> {
        let state = self.state.lock().await;
        let id = state
            .active_cart_id(user_id)
            .ok_or(CartError::CartNotFound)?;
        let (header, items) = &state.carts[&id];
        Ok(state.snapshot(*header, items))
    }

    async fn active_cart_id(&self, user_id: Uuid) -> CartResult<Option<Uuid>> {
        Ok(self.state.lock().await.active_cart_id(user_id))
    }

    async fn add_advert(&self, user_id: Uuid, advert_id: Uuid) -> CartResult<Cart> {
        let mut state = self.state.lock().await;

        let advert = state
            .adverts
            .get(&advert_id)
            .ok_or(CartError::AdvertNotFound(advert_id))?;
        if advert.status != AdvertStatus::Active {
            return Err(CartError::AdvertUnavailable(advert_id));
        }

        let cart_id = match state.active_cart_id(user_id) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                let header = CartHeader {
                    id,
                    user_id,
                    status: CartStatus::Active,
                };
                state.carts.insert(id, (header, Vec::new()));
                id
            }
        };

        let (header, items) = state
            .carts
            .get_mut(&cart_id)
            .ok_or(CartError::CartNotFound)?;
        if !items.contains(&advert_id) {
            items.push(advert_id);
        }
        let (header, items) = (*header, items.clone());
        Ok(state.snapshot(header, &items))
    }

    async fn remove_advert(&self, user_id: Uuid, advert_id: Uuid) -> CartResult<Cart> {
        let mut state = self.state.lock().await;

        let cart_id = state
            .active_cart_id(user_id)
            .ok_or(CartError::CartNotFound)?;
        let (header, items) = state
            .carts
            .get_mut(&cart_id)
            .ok_or(CartError::CartNotFound)?;

        let before = items.len();
        items.retain(|id| *id != advert_id);
        if items.len() == before {
            return Err(CartError::NotInCart(advert_id));
        }

        let (header, items) = (*header, items.clone());
        Ok(state.snapshot(header, &items))
    }

    async fn ping(&self) -> CartResult<()> {
        Ok(())
    }
}
