mod bootstrap;

use api_router::{api_routes, api_state::ApiState};
use common::utils::config::get_config;
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
