use anyhow::Result;
use common::{
    database::{self, DatabaseConfig},
    metrics::{Metrics, serve_metrics},
    proto::cart::SERVICE,
    rpc::{self, cancel_on_ctrl_c},
    telemetry,
};
use prometheus::Registry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod checkout;
mod error;
mod repositories;
mod routes;
mod settings;

use crate::{repositories::PgCartRepository, routes::AppState, settings::CartSettings};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing(SERVICE);

    info!("Starting cart service");

    let settings: CartSettings = common::config::load("CART")?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let carts = PgCartRepository::new(pool, db_config.call_timeout());

    let registry = Registry::new();
    let metrics = Arc::new(Metrics::new(&registry, "cart", SERVICE)?);

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    let metrics_task = {
        let addr = settings.metrics_addr.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { serve_metrics(&addr, registry, shutdown).await })
    };

    let app = routes::create_router(
        AppState {
            carts: Arc::new(carts),
        },
        metrics,
    );
    rpc::serve(&settings.bind_addr, app, shutdown.clone()).await?;

    shutdown.cancel();
    metrics_task.await??;

    info!("Cart service stopped");
    Ok(())
}
