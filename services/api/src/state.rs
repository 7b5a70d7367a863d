//! Application state shared across handlers

use std::sync::Arc;

use crate::{
    clients::Clients,
    csrf::CsrfCodec,
    payment::PaymentService,
    rate_limiter::RateLimiter,
    repositories::{AdvertRepository, UserRepository},
    sessions::SessionBackend,
};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionBackend>,
    pub users: Arc<dyn UserRepository>,
    pub adverts: Arc<dyn AdvertRepository>,
    pub payments: PaymentService,
    pub clients: Clients,
    pub csrf: CsrfCodec,
    pub login_limiter: RateLimiter,
    pub secure_cookie: bool,
}
