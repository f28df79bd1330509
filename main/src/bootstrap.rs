use std::sync::Arc;

use common::{
    error::AppError,
    providers::AiProvider,
    storage::{db::SurrealDbClient, store::StorageManager},
    utils::config::AppConfig,
};
use tracing::info;

/// Shared startup for every binary: database, provider, storage, and the
/// embedding-dimension guard that fails fast when the configured dimension
/// cannot match the index column.
pub struct Services {
    pub db: Arc<SurrealDbClient>,
    pub provider: Arc<AiProvider>,
    pub storage: StorageManager,
}

pub async fn init_services(config: &AppConfig) -> Result<Services, AppError> {
    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );

    let provider = Arc::new(AiProvider::from_config(config));
    if provider.dimension() != config.embed_dim {
        return Err(AppError::Validation(format!(
            "embed_dim {} does not match the provider dimension {}",
            config.embed_dim,
            provider.dimension()
        )));
    }

    db.ensure_initialized(config.embed_dim).await?;

    let storage = StorageManager::new(&config.storage_root).await?;

    info!(
        backend = provider.backend_label(),
        dimension = provider.dimension(),
        "services initialized"
    );

    Ok(Services {
        db,
        provider,
        storage,
    })
}
