use anyhow::Result;
use common::{
    database::{self, DatabaseConfig},
    metrics::{Metrics, serve_metrics},
    proto::media::SERVICE,
    rpc::{self, cancel_on_ctrl_c},
    telemetry,
};
use prometheus::Registry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod error;
mod pipeline;
mod repositories;
mod routes;
mod service;
mod settings;
mod storage;

use crate::{
    repositories::PgMediaRepository, routes::AppState, service::MediaService,
    settings::StaticSettings, storage::FileStorage,
};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing(SERVICE);

    info!("Starting static service");

    let settings: StaticSettings = common::config::load("STATIC")?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let media = MediaService::new(
        FileStorage::new(&settings.base_path),
        Arc::new(PgMediaRepository::new(pool, db_config.call_timeout())),
        settings.max_size,
    );
    info!(
        base_path = %settings.base_path,
        max_size = settings.max_size,
        "Media storage configured"
    );

    let registry = Registry::new();
    let metrics = Arc::new(Metrics::new(&registry, "static", SERVICE)?);

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    let metrics_task = {
        let addr = settings.metrics_addr.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { serve_metrics(&addr, registry, shutdown).await })
    };

    let app = routes::create_router(AppState { media }, metrics);
    rpc::serve(&settings.bind_addr, app, shutdown.clone()).await?;

    shutdown.cancel();
    metrics_task.await??;

    info!("Static service stopped");
    Ok(())
}
