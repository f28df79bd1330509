mod bootstrap;

use std::sync::Arc;

use api_router::{api_routes, api_state::ApiState};
use common::utils::config::get_config;
use ingestion_pipeline::{pipeline::IngestionPipeline, run_workers};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Combined binary: the HTTP surface and the ingestion workers in one
/// process. Deployments that scale the tiers separately use the `server`
/// and `worker` binaries instead.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
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

    let worker_db = Arc::clone(&services.db);
    let worker_concurrency = config.worker_concurrency;
    let worker_lease_secs = config.worker_lease_secs;
    let worker_task_time_limit_secs = config.worker_task_time_limit_secs;
    tokio::spawn(async move {
        info!(concurrency = worker_concurrency, "Starting worker loops");
        if let Err(e) = run_workers(
            worker_db,
            ingestion_pipeline,
            worker_concurrency,
            worker_lease_secs,
            worker_task_time_limit_secs,
        )
        .await
        {
            error!("Worker process error: {e}");
        }
    });

    let api_state = ApiState::new(
        services.db,
        services.provider,
        services.storage,
        config.clone(),
    );
    let app = api_routes(api_state).layer(tower_http::trace::TraceLayer::new_for_http());

    let serve_address = format!("0.0.0.0:{}", config.http_port);
    info!("Starting server listening on {serve_address}");
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests;
