use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use common::storage::types::{
    ingestion_task::IngestionTask,
    source::{Source, SourceStatus, SourceType},
};
use ingestion_pipeline::extract::url::ensure_ingestion_url_allowed;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    pub title: Option<String>,
    #[form_data(limit = "26000000")]
    pub file: FieldData<Bytes>,
}

/// `POST /sources/upload` — multipart pdf upload. The source row is created
/// in Uploaded and an ingestion job is queued; processing is asynchronous.
pub async fn upload_source(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = input.file.metadata.file_name.clone().unwrap_or_default();
    let content_type = input.file.metadata.content_type.clone().unwrap_or_default();

    let looks_like_pdf = content_type.eq_ignore_ascii_case("application/pdf")
        || file_name.to_ascii_lowercase().ends_with(".pdf");
    if !looks_like_pdf {
        return Err(ApiError::UnsupportedMediaType(
            "only pdf uploads are accepted".to_string(),
        ));
    }

    let bytes = input.file.contents;
    if bytes.len() > state.config.max_pdf_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "pdf is {} bytes, above the {} byte cap",
            bytes.len(),
            state.config.max_pdf_bytes
        )));
    }

    let title = input
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| file_name.clone());
    let source = Source::new(title, SourceType::Pdf, file_name);

    state
        .storage
        .put_source_bytes(&source.id, source.source_type.file_extension(), bytes)
        .await?;
    state.db.store_item(source.clone()).await.map_err(map_db)?;

    let task_id = IngestionTask::enqueue(&source.id, &state.db).await?;
    Source::set_ingest_task_id(&source.id, &task_id, &state.db).await?;

    info!(source_id = %source.id, %task_id, "pdf source queued for ingestion");

    let mut created = source;
    created.ingest_task_id = Some(task_id);
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub text: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
}

/// `POST /sources/ingest` — create a source from pasted text or a URL.
pub async fn ingest_source(
    State(state): State<ApiState>,
    Json(body): Json<IngestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let source = match (body.text, body.url) {
        (Some(_), Some(_)) | (None, None) => {
            return Err(ApiError::Validation(
                "provide exactly one of `text` or `url`".to_string(),
            ));
        }
        (Some(text), None) => {
            if text.trim().is_empty() {
                return Err(ApiError::Validation("text body is empty".to_string()));
            }
            if text.len() > state.config.max_text_bytes {
                return Err(ApiError::PayloadTooLarge(format!(
                    "text body is {} bytes, above the {} byte cap",
                    text.len(),
                    state.config.max_text_bytes
                )));
            }

            let title = body.title.unwrap_or_else(|| "Pasted text".to_string());
            let source = Source::new(title, SourceType::Text, String::new());
            state
                .storage
                .put_source_bytes(
                    &source.id,
                    source.source_type.file_extension(),
                    Bytes::from(text.into_bytes()),
                )
                .await?;
            source
        }
        (None, Some(url)) => {
            let parsed = url::Url::parse(&url)
                .map_err(|_| ApiError::Validation("Invalid URL".to_string()))?;
            ensure_ingestion_url_allowed(&parsed, &state.config.url_allowlist)
                .map_err(|err| ApiError::Forbidden(err.to_string()))?;

            let title = body.title.unwrap_or_else(|| url.clone());
            Source::new(title, SourceType::Url, url)
        }
    };

    state.db.store_item(source.clone()).await.map_err(map_db)?;
    let task_id = IngestionTask::enqueue(&source.id, &state.db).await?;
    Source::set_ingest_task_id(&source.id, &task_id, &state.db).await?;

    info!(source_id = %source.id, %task_id, "source queued for ingestion");

    let mut created = source;
    created.ingest_task_id = Some(task_id);
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub status: Option<SourceStatus>,
    pub source_type: Option<SourceType>,
}

pub async fn list_sources(
    State(state): State<ApiState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let sources = Source::list(
        &state.db,
        params.limit.unwrap_or(50).min(500),
        params.offset.unwrap_or(0),
        params.status,
        params.source_type,
    )
    .await?;

    Ok(Json(json!({ "sources": sources })))
}

pub async fn get_source(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let source = Source::get_required(&id, &state.db).await?;
    Ok(Json(source))
}

/// `DELETE /sources/{id}` — cascade: chunks, embeddings, jobs, answers,
/// queries, and the stored bytes all go.
pub async fn delete_source(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = Source::delete_cascade(&id, &state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("source {id} does not exist")))?;

    state
        .storage
        .delete_source_bytes(&deleted.id, deleted.source_type.file_extension())
        .await?;

    info!(source_id = %deleted.id, "source deleted");

    Ok(StatusCode::NO_CONTENT)
}

fn map_db(err: surrealdb::Error) -> ApiError {
    ApiError::from(common::error::AppError::Database(err))
}
