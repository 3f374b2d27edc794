use std::sync::Arc;

use chrono::Duration as ChronoDuration;

use stylehub_auth::Hs256JwtValidator;
use stylehub_infra::{AppConfig, SaleProcessor, SalesStore};
use stylehub_sales::TransitionPolicy;

/// Shared handles for request handlers.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn SalesStore>,
    pub processor: SaleProcessor,
    pub tokens: Arc<Hs256JwtValidator>,
    pub status_policy: TransitionPolicy,
}

impl AppServices {
    pub fn new(config: &AppConfig, store: Arc<dyn SalesStore>) -> Self {
        let ttl = ChronoDuration::from_std(config.token_ttl).unwrap_or(ChronoDuration::hours(1));
        Self {
            processor: SaleProcessor::new(store.clone(), config.sale_tx_timeout),
            tokens: Arc::new(Hs256JwtValidator::new(config.jwt_secret.clone().into_bytes(), ttl)),
            status_policy: config.status_policy,
            store,
        }
    }
}
