//! Gateway settings

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("GATEWAY_CSRF_SECRET must be exactly 32 bytes, got {0}")]
    CsrfSecretLength(usize),
}

/// Settings read from `GATEWAY_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_cart_url")]
    pub cart_url: String,
    #[serde(default = "default_static_url")]
    pub static_url: String,
    #[serde(default = "default_survey_url")]
    pub survey_url: String,
    /// Deadline for calls to the backend services, in seconds
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout: u64,

    pub csrf_secret: String,
    /// CSRF token lifetime in seconds
    #[serde(default = "default_csrf_ttl")]
    pub csrf_ttl: u64,
    #[serde(default)]
    pub secure_cookie: bool,

    #[serde(default)]
    pub payment_shop_id: String,
    #[serde(default)]
    pub payment_secret: String,
    #[serde(default = "default_payment_api_url")]
    pub payment_api_url: String,
    #[serde(default = "default_payment_return_url")]
    pub payment_return_url: String,
    /// Promotion price in minor currency units
    #[serde(default = "default_promotion_price")]
    pub promotion_price: i64,
    #[serde(default = "default_currency")]
    pub promotion_currency: String,
    /// How long a paid promotion lasts, in days
    #[serde(default = "default_promotion_days")]
    pub promotion_days: u64,
    /// Reconciliation tick, in seconds
    #[serde(default = "default_payment_poll_interval")]
    pub payment_poll_interval: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_auth_url() -> String {
    "http://127.0.0.1:8011".to_string()
}

fn default_cart_url() -> String {
    "http://127.0.0.1:8012".to_string()
}

fn default_static_url() -> String {
    "http://127.0.0.1:8013".to_string()
}

fn default_survey_url() -> String {
    "http://127.0.0.1:8014".to_string()
}

fn default_rpc_timeout() -> u64 {
    5
}

fn default_csrf_ttl() -> u64 {
    60 * 60
}

fn default_payment_api_url() -> String {
    "https://api.yookassa.ru/v3".to_string()
}

fn default_payment_return_url() -> String {
    "http://localhost:8080/api/v1/payment/callback".to_string()
}

fn default_promotion_price() -> i64 {
    10_000
}

fn default_currency() -> String {
    "RUB".to_string()
}

fn default_promotion_days() -> u64 {
    7
}

fn default_payment_poll_interval() -> u64 {
    60
}

impl GatewaySettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        let len = self.csrf_secret.len();
        if len != 32 {
            return Err(SettingsError::CsrfSecretLength(len));
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout)
    }

    pub fn csrf_ttl(&self) -> Duration {
        Duration::from_secs(self.csrf_ttl)
    }

    pub fn promotion_duration(&self) -> Duration {
        Duration::from_secs(self.promotion_days * 24 * 60 * 60)
    }

    pub fn payment_poll_interval(&self) -> Duration {
        Duration::from_secs(self.payment_poll_interval)
    }

    /// Price as the provider expects it, e.g. `100.00`
    pub fn promotion_amount(&self) -> String {
        format!(
            "{}.{:02}",
            self.promotion_price / 100,
            self.promotion_price % 100
        )
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> GatewaySettings {
    serde_json::from_value(serde_json::json!({
        "csrf_secret": "0123456789abcdef0123456789abcdef",
    }))
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_and_amount() {
        let settings = test_settings();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.promotion_amount(), "100.00");
        assert_eq!(settings.promotion_duration(), Duration::from_secs(7 * 86400));
        assert!(!settings.secure_cookie);
    }

    #[test]
    #[serial]
    fn test_short_csrf_secret_is_rejected() {
        unsafe {
            std::env::set_var("GATEWAY_CSRF_SECRET", "too-short");
        }
        let settings: GatewaySettings = common::config::load("GATEWAY").unwrap();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::CsrfSecretLength(9))
        ));
        unsafe {
            std::env::remove_var("GATEWAY_CSRF_SECRET");
        }
    }

    #[test]
    #[serial]
    fn test_missing_csrf_secret_fails_to_load() {
        unsafe {
            std::env::remove_var("GATEWAY_CSRF_SECRET");
        }
        assert!(common::config::load::<GatewaySettings>("GATEWAY").is_err());
    }
}
