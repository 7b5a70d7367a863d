use anyhow::Result;
use common::{
    database::{self, DatabaseConfig},
    metrics::{Metrics, serve_metrics},
    proto::survey::SERVICE,
    rpc::{self, cancel_on_ctrl_c},
    telemetry,
};
use prometheus::Registry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod error;
mod repositories;
mod routes;
mod settings;
mod stats;

use crate::{repositories::PgSurveyRepository, routes::AppState, settings::SurveySettings};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing(SERVICE);

    info!("Starting survey service");

    let settings: SurveySettings = common::config::load("SURVEY")?;

    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let survey = PgSurveyRepository::new(pool, db_config.call_timeout());

    let registry = Registry::new();
    let metrics = Arc::new(Metrics::new(&registry, "survey", SERVICE)?);

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    let metrics_task = {
        let addr = settings.metrics_addr.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { serve_metrics(&addr, registry, shutdown).await })
    };

    let app = routes::create_router(
        AppState {
            survey: Arc::new(survey),
        },
        metrics,
    );
    rpc::serve(&settings.bind_addr, app, shutdown.clone()).await?;

    shutdown.cancel();
    metrics_task.await??;

    info!("Survey service stopped");
    Ok(())
}
