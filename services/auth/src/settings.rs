use serde::Deserialize;
use std::time::Duration;

/// Settings read from `AUTH_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8011".to_string()
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9011".to_string()
}

fn default_session_ttl() -> u64 {
    24 * 60 * 60
}

impl AuthSettings {
    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_ttl)
    }
}
