use std::sync::Arc;

use common::{
    providers::AiProvider,
    storage::{db::SurrealDbClient, store::StorageManager},
    utils::config::AppConfig,
};

use crate::middleware_rate_limit::RateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub provider: Arc<AiProvider>,
    pub storage: StorageManager,
    pub config: AppConfig,
    pub limiter: Arc<RateLimiter>,
}

impl ApiState {
    pub fn new(
        db: Arc<SurrealDbClient>,
        provider: Arc<AiProvider>,
        storage: StorageManager,
        config: AppConfig,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config));
        Self {
            db,
            provider,
            storage,
            config,
            limiter,
        }
    }
}
