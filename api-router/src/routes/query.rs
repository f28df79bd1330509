use std::time::Duration;

use answer_pipeline::{answer_query, hydrator::hydrate_answer, QueryOptions};
use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use common::{
    error::AppError,
    storage::types::{answer::AnswerRecord, idempotency_key::IdempotencyKey},
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{api_state::ApiState, error::ApiError};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub question: String,
    #[serde(default)]
    pub source_ids: Vec<String>,
    /// Overrides the service-wide rerank default for this query.
    #[serde(default)]
    pub rerank: Option<bool>,
}

pub async fn query(
    state: State<ApiState>,
    headers: HeaderMap,
    body: Json<QueryBody>,
) -> Result<impl IntoResponse, ApiError> {
    run_query(state, headers, body, false, false).await
}

pub async fn query_verified(
    state: State<ApiState>,
    headers: HeaderMap,
    body: Json<QueryBody>,
) -> Result<impl IntoResponse, ApiError> {
    run_query(state, headers, body, true, false).await
}

pub async fn query_verified_highlights(
    state: State<ApiState>,
    headers: HeaderMap,
    body: Json<QueryBody>,
) -> Result<impl IntoResponse, ApiError> {
    run_query(state, headers, body, true, true).await
}

/// Shared handler behind the three query endpoints: idempotency replay,
/// the per-request deadline, and the answer pipeline itself.
async fn run_query(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<QueryBody>,
    verify: bool,
    highlights: bool,
) -> Result<impl IntoResponse, ApiError> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(key) = idempotency_key.as_deref() {
        if let Some(answer_id) = IdempotencyKey::find(key, &state.db).await? {
            debug!(%answer_id, "idempotency replay");
            let record = AnswerRecord::get_required(&answer_id, &state.db).await?;
            return Ok(Json(hydrate_answer(record)));
        }
    }

    let options = QueryOptions {
        verify,
        highlights,
        rerank: body.rerank,
    };

    let deadline = Duration::from_secs(state.config.request_timeout_secs.max(1));
    let response = tokio::time::timeout(
        deadline,
        answer_query(
            &state.db,
            &state.provider,
            &state.config,
            &body.question,
            &body.source_ids,
            options,
        ),
    )
    .await
    .map_err(|_| {
        AppError::Timeout(format!(
            "query exceeded the {}s deadline",
            deadline.as_secs()
        ))
    })??;

    if let Some(key) = idempotency_key.as_deref() {
        let bound = IdempotencyKey::bind(key, &response.answer_id, &state.db).await?;
        if bound != response.answer_id {
            // A concurrent duplicate finished first; its answer wins.
            info!(winner = %bound, loser = %response.answer_id, "idempotency race resolved");
            let record = AnswerRecord::get_required(&bound, &state.db).await?;
            return Ok(Json(hydrate_answer(record)));
        }
    }

    Ok(Json(response))
}
