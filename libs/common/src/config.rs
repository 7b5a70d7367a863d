//! Per-service settings loader
//!
//! Settings structs are plain serde types with field defaults; values are
//! read from environment variables carrying the service prefix, e.g.
//! `CART_BIND_ADDR` populates `bind_addr` when loaded with prefix `CART`.

use serde::de::DeserializeOwned;

pub use config::ConfigError;

/// Load settings of type `T` from `{PREFIX}_*` environment variables
pub fn load<T: DeserializeOwned>(prefix: &str) -> Result<T, ConfigError> {
    config::Config::builder()
        .add_source(
            config::Environment::with_prefix(prefix)
                .prefix_separator("_")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
