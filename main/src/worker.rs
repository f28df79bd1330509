mod bootstrap;

use std::sync::Arc;

use common::utils::config::get_config;
use ingestion_pipeline::{pipeline::IngestionPipeline, run_workers};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;
    let services = bootstrap::init_services(&config).await?;

    let ingestion_pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&services.db),
        Arc::clone(&services.provider),
        services.storage.clone(),
        config.clone(),
    ));

    info!(
        concurrency = config.worker_concurrency,
        "Starting ingestion workers"
    );
    run_workers(
        services.db,
        ingestion_pipeline,
        config.worker_concurrency,
        config.worker_lease_secs,
        config.worker_task_time_limit_secs,
    )
    .await
    .map_err(|e| -> Box<dyn std::error::Error> { e })
}
