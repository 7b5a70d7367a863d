//! Common library for the Bazaar services
//!
//! This crate provides the functionality every service shares: the SQL pool
//! builder, the session-store driver, error kinds, the metrics interceptor,
//! RPC plumbing and the wire types exchanged between services.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, init_pool, health_check};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     let is_healthy = health_check(&pool).await?;
//!     println!("Database health check: {}", is_healthy);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod metrics;
pub mod proto;
pub mod rpc;
pub mod telemetry;
