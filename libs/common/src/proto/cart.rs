//! Cart/Purchase service surface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AdvertStatus, CartStatus, DeliveryMethod, PaymentMethod, PurchaseStatus};

pub const SERVICE: &str = "cart";

pub const ADD_PURCHASE: &str = "AddPurchase";
pub const GET_PURCHASES_BY_USER_ID: &str = "GetPurchasesByUserID";
pub const GET_CART_BY_ID: &str = "GetCartByID";
pub const GET_CART_BY_USER_ID: &str = "GetCartByUserID";
pub const ADD_ADVERT_TO_CART: &str = "AddAdvertToCart";
pub const DELETE_ADVERT_FROM_CART: &str = "DeleteAdvertFromCart";
pub const CHECK_CART_EXISTS: &str = "CheckCartExists";

/// Advert as seen from a cart or a purchase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdvertSnapshot {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub price: i64,
    pub image_id: Option<Uuid>,
    pub status: AdvertStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: CartStatus,
    pub adverts: Vec<AdvertSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Purchase {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub customer_id: Uuid,
    pub seller_id: Uuid,
    pub address: String,
    pub payment_method: PaymentMethod,
    pub delivery_method: DeliveryMethod,
    pub status: PurchaseStatus,
    pub adverts: Vec<AdvertSnapshot>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPurchaseRequest {
    pub cart_id: Uuid,
    pub user_id: Uuid,
    pub address: String,
    pub payment_method: PaymentMethod,
    pub delivery_method: DeliveryMethod,
}

/// One purchase is created per seller present in the cart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseList {
    pub purchases: Vec<Purchase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartIdRequest {
    pub cart_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartAdvertRequest {
    pub user_id: Uuid,
    pub advert_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartExists {
    pub exists: bool,
    pub cart_id: Option<Uuid>,
}
