use anyhow::Result;
use common::{
    database::{self, DatabaseConfig},
    metrics::Metrics,
    rpc::{self, cancel_on_ctrl_c},
    telemetry,
};
use prometheus::Registry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod clients;
mod csrf;
mod error;
mod middleware;
mod models;
mod payment;
mod rate_limiter;
mod repositories;
mod routes;
mod sessions;
mod settings;
mod state;
mod validation;

use crate::{
    clients::Clients,
    csrf::CsrfCodec,
    payment::{
        PaymentService, PromotionTerms, provider::HttpPaymentProvider, worker::PaymentWorker,
    },
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::{PgAdvertRepository, PgOrderRepository, PgUserRepository},
    routes::SERVICE,
    sessions::RpcSessions,
    settings::GatewaySettings,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing(SERVICE);

    info!("Starting gateway");

    let settings: GatewaySettings = common::config::load("GATEWAY")?;
    settings.validate()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let call_timeout = db_config.call_timeout();
    let users = Arc::new(PgUserRepository::new(pool.clone(), call_timeout));
    let adverts = Arc::new(PgAdvertRepository::new(pool.clone(), call_timeout));
    let orders = Arc::new(PgOrderRepository::new(pool, call_timeout));

    let registry = Registry::new();
    let metrics = Arc::new(Metrics::new(&registry, "gateway", SERVICE)?);
    let clients = Clients::new(&settings, &registry)?;

    let csrf = CsrfCodec::new(settings.csrf_secret.as_bytes(), settings.csrf_ttl())?;

    let provider = Arc::new(HttpPaymentProvider::new(
        &settings.payment_api_url,
        &settings.payment_shop_id,
        &settings.payment_secret,
    )?);
    let payments = PaymentService::new(
        provider.clone(),
        orders.clone(),
        adverts.clone(),
        PromotionTerms::from_settings(&settings),
    );

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    let worker_task = {
        let worker = Arc::new(PaymentWorker::new(
            orders,
            provider,
            settings.payment_poll_interval(),
            settings.promotion_duration(),
        ));
        let shutdown = shutdown.clone();
        tokio::spawn(async move { worker.run(shutdown).await })
    };

    let state = AppState {
        sessions: Arc::new(RpcSessions::new(clients.auth.clone())),
        users,
        adverts,
        payments,
        clients,
        csrf,
        login_limiter: RateLimiter::new(RateLimiterConfig::default()),
        secure_cookie: settings.secure_cookie,
    };

    let app = routes::create_router(state, metrics, registry);
    rpc::serve(&settings.bind_addr, app, shutdown.clone()).await?;

    // Let the payment worker drain before exiting
    shutdown.cancel();
    worker_task.await?;

    info!("Gateway stopped");
    Ok(())
}
