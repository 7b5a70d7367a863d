//! HTTP surface of the gateway

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use common::{
    metrics::{Metrics, metrics_router},
    rpc::{health_router, with_common_layers},
};
use prometheus::Registry;
use std::sync::Arc;

use crate::{
    middleware::{annotate, csrf_guard, require_auth},
    state::AppState,
};

mod accounts;
mod adverts;
mod files;
mod payments;
mod purchases;
mod survey;

pub const SERVICE: &str = "gateway";

/// Create the router for the gateway
pub fn create_router(state: AppState, metrics: Arc<Metrics>, registry: Registry) -> Router {
    // Open to everyone; responses say whether the caller was recognised
    let public = Router::new()
        .route("/signup", post(accounts::signup))
        .route("/login", post(accounts::login))
        .route("/profile/:user_id", get(accounts::public_profile))
        .route("/api/v1/adverts", get(adverts::list))
        .route("/api/v1/adverts/:advert_id", get(adverts::get))
        .route("/api/v1/categories", get(adverts::categories))
        .route("/api/v1/history/:advert_id", get(adverts::price_history))
        .route("/api/v1/sellers/:seller_id/adverts", get(adverts::by_seller))
        .route("/api/v1/files/:file_id", get(files::uri))
        .route("/api/v1/static/*path", get(files::download))
        .route("/api/v1/survey/questions/:page", get(survey::questions))
        .route("/api/v1/survey/stats", get(survey::stats))
        .route("/api/v1/payment/callback", get(payments::callback))
        .route_layer(from_fn_with_state(state.clone(), annotate));

    // Session required, no CSRF token: ending a session is always allowed
    let session = Router::new()
        .route("/logout", post(accounts::logout))
        .route("/api/v1/csrf-token", get(accounts::csrf_token))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let protected = Router::new()
        .route("/me", get(accounts::me))
        .route(
            "/profile",
            get(accounts::me).put(accounts::update_profile),
        )
        .route("/password", post(accounts::change_password))
        .route("/logout/all", post(accounts::logout_everywhere))
        .route(
            "/api/v1/upload/:kind",
            post(files::upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/v1/cart", get(purchases::cart))
        .route("/api/v1/cart/exists", get(purchases::cart_exists))
        .route("/api/v1/carts/:cart_id", get(purchases::cart_by_id))
        .route(
            "/api/v1/cart/adverts/:advert_id",
            post(purchases::add_advert).delete(purchases::remove_advert),
        )
        .route(
            "/api/v1/purchases",
            get(purchases::purchases).post(purchases::checkout),
        )
        .route("/api/v1/survey/answers", post(survey::answer))
        .route("/api/v1/payment/init", post(payments::init))
        .route_layer(from_fn_with_state(state.clone(), csrf_guard))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let app = Router::new()
        .merge(public)
        .merge(session)
        .merge(protected)
        .with_state(state);

    with_common_layers(app.merge(health_router(SERVICE)), metrics).merge(metrics_router(registry))
}
