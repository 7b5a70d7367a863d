//! Payment provider client (YooKassa-style REST API)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use super::PaymentError;

/// Deadline for every call to the provider
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Client-side dedupe token sent as `Idempotence-Key`
    pub idempotence_key: Uuid,
    pub order_id: Uuid,
    pub item_id: Uuid,
    /// Decimal amount, e.g. `100.00`
    pub amount: String,
    pub currency: String,
    pub description: String,
    pub return_url: String,
}

#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub payment_id: String,
    pub confirmation_url: String,
}

/// Provider-side state of a payment
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentState {
    pub status: String,
    pub item_id: Option<Uuid>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_payment(&self, payment: &NewPayment) -> Result<CreatedPayment, PaymentError>;

    async fn payment_state(&self, payment_id: &str) -> Result<PaymentState, PaymentError>;
}

#[derive(Serialize)]
struct Amount<'a> {
    value: &'a str,
    currency: &'a str,
}

#[derive(Serialize)]
struct Confirmation<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    return_url: &'a str,
}

#[derive(Serialize)]
struct CreateBody<'a> {
    amount: Amount<'a>,
    capture: bool,
    confirmation: Confirmation<'a>,
    description: &'a str,
    metadata: Metadata,
}

#[derive(Serialize, Deserialize, Default)]
struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    item_id: Option<String>,
}

#[derive(Deserialize)]
struct ConfirmationAnswer {
    confirmation_url: Option<String>,
}

#[derive(Deserialize)]
struct PaymentAnswer {
    id: String,
    status: String,
    #[serde(default)]
    confirmation: Option<ConfirmationAnswer>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

/// HTTP client for the provider's `/payments` endpoints, authenticated with
/// the shop id and secret key
#[derive(Clone)]
pub struct HttpPaymentProvider {
    http: reqwest::Client,
    api_url: String,
    shop_id: String,
    secret: String,
}

impl HttpPaymentProvider {
    pub fn new(api_url: &str, shop_id: &str, secret: &str) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            shop_id: shop_id.to_string(),
            secret: secret.to_string(),
        })
    }

    async fn answer(response: reqwest::Response) -> Result<PaymentAnswer, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Payment provider error: {}", body);
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn create_payment(&self, payment: &NewPayment) -> Result<CreatedPayment, PaymentError> {
        let body = CreateBody {
            amount: Amount {
                value: &payment.amount,
                currency: &payment.currency,
            },
            capture: true,
            confirmation: Confirmation {
                kind: "redirect",
                return_url: &payment.return_url,
            },
            description: &payment.description,
            metadata: Metadata {
                order_id: Some(payment.order_id.to_string()),
                item_id: Some(payment.item_id.to_string()),
            },
        };

        let response = self
            .http
            .post(format!("{}/payments", self.api_url))
            .basic_auth(&self.shop_id, Some(&self.secret))
            .header("Idempotence-Key", payment.idempotence_key.to_string())
            .json(&body)
            .send()
            .await?;

        let answer = Self::answer(response).await?;
        let confirmation_url = answer
            .confirmation
            .and_then(|c| c.confirmation_url)
            .ok_or(PaymentError::Incomplete("confirmation_url"))?;

        Ok(CreatedPayment {
            payment_id: answer.id,
            confirmation_url,
        })
    }

    async fn payment_state(&self, payment_id: &str) -> Result<PaymentState, PaymentError> {
        let response = self
            .http
            .get(format!("{}/payments/{}", self.api_url, payment_id))
            .basic_auth(&self.shop_id, Some(&self.secret))
            .send()
            .await?;

        let answer = Self::answer(response).await?;
        let item_id = answer
            .metadata
            .and_then(|m| m.item_id)
            .and_then(|raw| Uuid::parse_str(&raw).ok());

        Ok(PaymentState {
            status: answer.status,
            item_id,
        })
    }
}
