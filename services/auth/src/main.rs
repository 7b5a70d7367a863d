use anyhow::Result;
use common::{
    cache::{KeyValueStore, RedisConfig, RedisPool},
    metrics::{Metrics, serve_metrics},
    proto::auth::SERVICE,
    rpc::{self, cancel_on_ctrl_c},
    telemetry,
};
use prometheus::Registry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod routes;
mod session;
mod settings;

use crate::{routes::AppState, session::SessionStore, settings::AuthSettings};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing(SERVICE);

    info!("Starting authentication service");

    let settings: AuthSettings = common::config::load("AUTH")?;

    // Initialize Redis connection pool
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;
    if !redis_pool.health_check().await? {
        anyhow::bail!("Failed to connect to session store");
    }
    info!("Session store connection successful");

    let sessions = SessionStore::new(Arc::new(redis_pool), settings.session_lifetime());

    let registry = Registry::new();
    let metrics = Arc::new(Metrics::new(&registry, "auth", SERVICE)?);

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    let metrics_task = {
        let addr = settings.metrics_addr.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { serve_metrics(&addr, registry, shutdown).await })
    };

    let app = routes::create_router(AppState { sessions }, metrics);
    rpc::serve(&settings.bind_addr, app, shutdown.clone()).await?;

    shutdown.cancel();
    metrics_task.await??;

    info!("Authentication service stopped");
    Ok(())
}
