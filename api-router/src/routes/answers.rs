use answer_pipeline::hydrator::hydrate_answer;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use common::storage::types::answer::AnswerRecord;

use crate::{api_state::ApiState, error::ApiError};

/// `GET /answers/{id}` — hydrate the persisted row (legacy payloads are
/// repaired on the way out, never written back).
pub async fn get_answer(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = AnswerRecord::get_required(&id, &state.db).await?;
    Ok(Json(hydrate_answer(record)))
}

/// `GET /answers/{id}/grouped` — same payload with citations grouped by
/// source.
pub async fn get_answer_grouped(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = AnswerRecord::get_required(&id, &state.db).await?;
    Ok(Json(hydrate_answer(record).with_groups()))
}

/// `GET /answers/{id}/highlights` — highlight offsets ride on the evidence
/// entries; they exist when the answer was produced by a highlights
/// endpoint.
pub async fn get_answer_highlights(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = AnswerRecord::get_required(&id, &state.db).await?;
    Ok(Json(hydrate_answer(record)))
}
