//! Outbound clients for the backend services

use common::{
    metrics::Metrics,
    proto::{auth, cart, media, survey},
    rpc::RpcClient,
};
use prometheus::Registry;
use std::sync::Arc;

use crate::settings::GatewaySettings;

/// One instrumented client per backend service. Client-side metrics are
/// registered as `{service}_client_*` in the gateway's registry.
#[derive(Clone)]
pub struct Clients {
    pub auth: RpcClient,
    pub cart: RpcClient,
    pub media: RpcClient,
    pub survey: RpcClient,
}

impl Clients {
    pub fn new(settings: &GatewaySettings, registry: &Registry) -> anyhow::Result<Self> {
        let timeout = settings.rpc_timeout();
        let client = |url: &str, service: &str| -> anyhow::Result<RpcClient> {
            let metrics = Metrics::new(registry, &format!("{}_client", service), service)?;
            Ok(RpcClient::new(url, service, timeout, Arc::new(metrics))?)
        };

        Ok(Self {
            auth: client(&settings.auth_url, auth::SERVICE)?,
            cart: client(&settings.cart_url, cart::SERVICE)?,
            media: client(&settings.static_url, media::SERVICE)?,
            survey: client(&settings.survey_url, survey::SERVICE)?,
        })
    }
}
