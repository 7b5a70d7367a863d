//! Paid-promotion orders

use chrono::{DateTime, Utc};
use common::proto::OrderStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local record of a payment created at the provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    /// Provider-side payment id
    pub payment_id: String,
    pub user_id: Uuid,
    pub advert_id: Uuid,
    /// Minor currency units
    pub amount: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct InitPaymentRequest {
    pub item_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitPaymentResponse {
    pub payment_url: String,
}
