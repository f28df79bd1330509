#![allow(clippy::missing_docs_in_private_items)]

use api_state::ApiState;
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use middleware_api_auth::api_auth;
use middleware_rate_limit::rate_limit;
use routes::{
    answers::{get_answer, get_answer_grouped, get_answer_highlights},
    health::{deps, live},
    query::{query, query_verified, query_verified_highlights},
    sources::{delete_source, get_source, ingest_source, list_sources, upload_source},
};

pub mod api_state;
pub mod error;
mod middleware_api_auth;
mod middleware_rate_limit;
mod routes;

/// The JSON surface. Health endpoints are public (probes); everything else
/// sits behind the api-key and rate-limit middleware.
pub fn api_routes(state: ApiState) -> Router {
    let public = Router::new()
        .route("/health", get(live))
        .route("/health/deps", get(deps));

    let upload_body_limit = state.config.max_pdf_bytes.saturating_add(1024 * 1024);

    let protected = Router::new()
        .route(
            "/sources/upload",
            post(upload_source).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/sources/ingest", post(ingest_source))
        .route("/sources", get(list_sources))
        .route("/sources/{id}", get(get_source))
        .route("/sources/{id}", delete(delete_source))
        .route("/query", post(query))
        .route("/query/verified", post(query_verified))
        .route("/query/verified/highlights", post(query_verified_highlights))
        .route("/answers/{id}", get(get_answer))
        .route("/answers/{id}/grouped", get(get_answer_grouped))
        .route("/answers/{id}/highlights", get(get_answer_highlights))
        .route_layer(from_fn_with_state(state.clone(), rate_limit))
        .route_layer(from_fn_with_state(state.clone(), api_auth));

    public.merge(protected).with_state(state)
}
