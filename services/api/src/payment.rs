//! Paid advert promotion
//!
//! [`PaymentService::initiate`] opens a payment at the provider and records
//! an `in_process` order; [`worker::PaymentWorker`] later asks the provider
//! how each open order ended and promotes the advert once it is paid.

use chrono::Utc;
use common::{error::{DatabaseError, ServiceError}, proto::OrderStatus};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    models::payment::Order,
    repositories::{AdvertRepository, OrderRepository},
    settings::GatewaySettings,
};

pub mod provider;
pub mod worker;

use provider::{NewPayment, PaymentProvider};

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("payment provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment provider answered {status}")]
    Rejected { status: u16 },

    #[error("payment provider answer is missing {0}")]
    Incomplete(&'static str),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<PaymentError> for ServiceError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Database(e) => e.into(),
            other => {
                error!("Payment init failed: {}", other);
                ServiceError::PaymentInitFailed("payment provider rejected the request".to_string())
            }
        }
    }
}

/// What a promotion costs and how long it lasts
#[derive(Debug, Clone)]
pub struct PromotionTerms {
    /// Minor currency units
    pub price: i64,
    pub amount: String,
    pub currency: String,
    pub duration: Duration,
    pub return_url: String,
}

impl PromotionTerms {
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            price: settings.promotion_price,
            amount: settings.promotion_amount(),
            currency: settings.promotion_currency.clone(),
            duration: settings.promotion_duration(),
            return_url: settings.payment_return_url.clone(),
        }
    }
}

#[derive(Clone)]
pub struct PaymentService {
    provider: Arc<dyn PaymentProvider>,
    orders: Arc<dyn OrderRepository>,
    adverts: Arc<dyn AdvertRepository>,
    terms: PromotionTerms,
}

impl PaymentService {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        orders: Arc<dyn OrderRepository>,
        adverts: Arc<dyn AdvertRepository>,
        terms: PromotionTerms,
    ) -> Self {
        Self {
            provider,
            orders,
            adverts,
            terms,
        }
    }

    /// Open a promotion payment for `item_id` on behalf of its owner and
    /// return the provider's confirmation URL
    pub async fn initiate(&self, user_id: Uuid, item_id: Uuid) -> Result<String, ServiceError> {
        match self.adverts.owner(item_id).await? {
            None => return Err(ServiceError::NotFound("advert not found".to_string())),
            Some(owner) if owner != user_id => {
                return Err(ServiceError::Forbidden(
                    "only the advert owner can promote it".to_string(),
                ));
            }
            Some(_) => {}
        }

        let order_id = Uuid::new_v4();
        let created = self
            .provider
            .create_payment(&NewPayment {
                idempotence_key: Uuid::new_v4(),
                order_id,
                item_id,
                amount: self.terms.amount.clone(),
                currency: self.terms.currency.clone(),
                description: format!("Promotion of advert {}", item_id),
                return_url: self.terms.return_url.clone(),
            })
            .await?;

        let now = Utc::now();
        self.orders
            .insert(&Order {
                id: order_id,
                payment_id: created.payment_id,
                user_id,
                advert_id: item_id,
                amount: self.terms.price,
                status: OrderStatus::InProcess,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(%order_id, %item_id, "Promotion payment initiated");
        Ok(created.confirmation_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{payment::provider::stub::StubProvider, repositories::memory::MemoryDb};

    fn service(db: &MemoryDb, provider: &StubProvider) -> PaymentService {
        PaymentService::new(
            Arc::new(provider.clone()),
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            PromotionTerms::from_settings(&crate::settings::test_settings()),
        )
    }

    #[tokio::test]
    async fn test_initiate_records_in_process_order() {
        let db = MemoryDb::new();
        let provider = StubProvider::new();
        let owner = Uuid::new_v4();
        let advert = db.seed_advert(owner, "Bike", 5000).await;

        let url = service(&db, &provider).initiate(owner, advert).await.unwrap();

        let orders = db.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::InProcess);
        assert_eq!(orders[0].advert_id, advert);
        assert_eq!(orders[0].amount, 10_000);
        assert!(url.ends_with(&orders[0].payment_id));

        let sent = provider.last_request().await.unwrap();
        assert_eq!(sent.order_id, orders[0].id);
        assert_eq!(sent.amount, "100.00");
    }

    #[tokio::test]
    async fn test_provider_rejection_leaves_no_order() {
        let db = MemoryDb::new();
        let provider = StubProvider::new();
        provider.reject_next(502).await;
        let owner = Uuid::new_v4();
        let advert = db.seed_advert(owner, "Bike", 5000).await;

        let err = service(&db, &provider)
            .initiate(owner, advert)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::PaymentInitFailed(_)));
        assert!(!err.public_message().contains("502"));
        assert!(db.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_only_the_owner_can_promote() {
        let db = MemoryDb::new();
        let provider = StubProvider::new();
        let advert = db.seed_advert(Uuid::new_v4(), "Bike", 5000).await;
        let service = service(&db, &provider);

        assert!(matches!(
            service.initiate(Uuid::new_v4(), advert).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.initiate(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(provider.last_request().await.is_none());
    }
}
