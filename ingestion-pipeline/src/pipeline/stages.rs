use common::{
    error::AppError,
    storage::types::{chunk::DocumentChunk, source::{Source, SourceType}},
};
use state_machines::core::GuardError;
use tracing::{debug, info, instrument};

use crate::{
    chunker::chunk_document,
    extract::{pdf::extract_pdf_pages, text::validate_text, url::extract_url_text, ExtractedContent},
};

use super::{
    context::PipelineContext,
    state::{Chunked, Embedded, Extracted, IngestionMachine, Persisted, Ready},
};

#[instrument(
    level = "trace",
    skip_all,
    fields(task_id = %ctx.task_id, attempt = ctx.attempt, source_id = %ctx.source_id)
)]
pub async fn extract_content(
    machine: IngestionMachine<(), Ready>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Extracted>, AppError> {
    let source = Source::get_required(&ctx.source_id, ctx.db).await?;

    let content = match source.source_type {
        SourceType::Pdf => {
            let bytes = ctx
                .storage
                .get_source_bytes(&source.id, source.source_type.file_extension())
                .await?;
            let max_bytes = ctx.app_config.max_pdf_bytes;
            let max_pages = ctx.app_config.max_pdf_pages;
            // pdf parsing is CPU-bound and occasionally pathological; keep it
            // off the async workers.
            let pages = tokio::task::spawn_blocking(move || {
                extract_pdf_pages(&bytes, max_bytes, max_pages)
            })
            .await??;
            ExtractedContent::Pages(pages)
        }
        SourceType::Text => {
            let bytes = ctx
                .storage
                .get_source_bytes(&source.id, source.source_type.file_extension())
                .await?;
            let body = String::from_utf8_lossy(&bytes).into_owned();
            validate_text(&body, ctx.app_config.max_text_bytes)?;
            ExtractedContent::Text(body)
        }
        SourceType::Url => {
            let (_, body) = extract_url_text(
                &source.origin,
                &ctx.app_config.url_allowlist,
                ctx.app_config.max_url_bytes,
            )
            .await?;
            validate_text(&body, ctx.app_config.max_url_bytes)?;
            ExtractedContent::Text(body)
        }
    };

    let cleaned = content.into_cleaned();
    info!(
        task_id = %ctx.task_id,
        source_id = %ctx.source_id,
        chars = cleaned.text.chars().count(),
        pages = cleaned.page_map.len(),
        sections = cleaned.section_map.len(),
        "extracted source content"
    );

    ctx.source = Some(source);
    ctx.cleaned = Some(cleaned);

    machine
        .extract()
        .map_err(|(_, guard)| map_guard_error("extract", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(task_id = %ctx.task_id, attempt = ctx.attempt, source_id = %ctx.source_id)
)]
pub fn chunk_content(
    machine: IngestionMachine<(), Extracted>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Chunked>, AppError> {
    let cleaned = ctx.cleaned()?;

    let pieces = chunk_document(
        cleaned,
        ctx.app_config.chunk_char_target,
        ctx.app_config.chunk_char_overlap,
    );

    if pieces.is_empty() {
        return Err(AppError::Validation(
            "source produced no text to chunk".into(),
        ));
    }

    debug!(
        task_id = %ctx.task_id,
        chunks = pieces.len(),
        "chunked source content"
    );

    ctx.pieces = pieces;

    machine
        .chunk()
        .map_err(|(_, guard)| map_guard_error("chunk", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(task_id = %ctx.task_id, attempt = ctx.attempt, source_id = %ctx.source_id)
)]
pub async fn embed_chunks(
    machine: IngestionMachine<(), Chunked>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Embedded>, AppError> {
    let texts: Vec<String> = ctx.pieces.iter().map(|piece| piece.text.clone()).collect();
    let embeddings = ctx.provider.embed(&texts).await?;

    if embeddings.len() != ctx.pieces.len() {
        return Err(AppError::Provider(format!(
            "embedder returned {} vectors for {} chunks",
            embeddings.len(),
            ctx.pieces.len()
        )));
    }

    let rows = std::mem::take(&mut ctx.pieces)
        .into_iter()
        .zip(embeddings)
        .map(|(piece, embedding)| {
            let chunk = DocumentChunk::new(
                ctx.source_id.clone(),
                piece.ordinal,
                piece.text,
                piece.char_start,
                piece.char_end,
                piece.page_start,
                piece.page_end,
                piece.section_path,
            );
            (chunk, embedding)
        })
        .collect();

    ctx.rows = rows;

    machine
        .embed()
        .map_err(|(_, guard)| map_guard_error("embed", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(task_id = %ctx.task_id, attempt = ctx.attempt, source_id = %ctx.source_id)
)]
pub async fn persist_chunks(
    machine: IngestionMachine<(), Embedded>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Persisted>, AppError> {
    let rows = std::mem::take(&mut ctx.rows);
    let chunk_count = rows.len();

    DocumentChunk::replace_for_source(&ctx.source_id, rows, ctx.db).await?;
    ctx.db.rebuild_indexes().await?;

    Source::mark_ready(&ctx.source_id, ctx.db).await?;

    info!(
        task_id = %ctx.task_id,
        source_id = %ctx.source_id,
        title = %ctx.source()?.title,
        chunks = chunk_count,
        "source is ready"
    );

    machine
        .persist()
        .map_err(|(_, guard)| map_guard_error("persist", &guard))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid ingestion pipeline transition during {event}: {guard:?}"
    ))
}
