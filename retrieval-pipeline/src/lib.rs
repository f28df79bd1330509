#![allow(clippy::missing_docs_in_private_items)]

pub mod mmr;
pub mod reranker;
pub mod scoring;

use std::collections::HashMap;
use std::time::Instant;

use common::{
    error::AppError,
    providers::AiProvider,
    storage::{
        db::SurrealDbClient,
        types::{chunk::DocumentChunk, chunk_embedding::ChunkEmbedding},
    },
    utils::config::AppConfig,
};
use tracing::{debug, info, instrument};

pub use scoring::{Candidate, Scores};

/// Per-call retrieval settings, lifted out of `AppConfig` so a request's
/// option flags can override the service defaults.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub candidates: usize,
    pub max_chunks: usize,
    pub rerank_enabled: bool,
    pub rerank_snippet_chars: usize,
    pub mmr_enabled: bool,
    pub mmr_lambda: f32,
    pub per_source_limit: Option<usize>,
    /// Weight of the vector arm in the hybrid blend.
    pub alpha: f32,
}

impl RetrievalConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            candidates: config.rerank_candidates.max(1),
            max_chunks: config.max_chunks_per_query.max(1),
            rerank_enabled: config.rerank_enabled,
            rerank_snippet_chars: config.rerank_snippet_chars,
            mmr_enabled: config.mmr_enabled,
            mmr_lambda: config.mmr_lambda,
            per_source_limit: config.per_source_retrieval_limit,
            alpha: 0.5,
        }
    }
}

/// What a retrieval run hands to the synthesizer.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    /// Final selection, in selection order, at most `max_chunks` long.
    pub selected: Vec<Candidate>,
    /// Size of the merged candidate pool before selection.
    pub pool_size: usize,
    pub query_embedding: Vec<f32>,
}

/// Hybrid retrieval: embed the question once, run the vector and lexical
/// arms in parallel over the allowed sources, fuse, rerank, diversify.
/// `source_ids` must already be narrowed to READY sources.
#[instrument(skip_all, fields(sources = source_ids.len()))]
pub async fn retrieve(
    db: &SurrealDbClient,
    provider: &AiProvider,
    question: &str,
    source_ids: &[String],
    config: &RetrievalConfig,
) -> Result<RetrievalOutcome, AppError> {
    let embed_started = Instant::now();
    let mut embeddings = provider.embed(std::slice::from_ref(&question.to_string())).await?;
    let query_embedding = embeddings
        .pop()
        .ok_or_else(|| AppError::Provider("embedder returned no vector for the question".into()))?;
    let embed_ms = embed_started.elapsed().as_millis();

    let search_started = Instant::now();
    let (vector_results, lexical_results) = tokio::try_join!(
        DocumentChunk::vector_search(
            config.candidates,
            &query_embedding,
            source_ids,
            config.per_source_limit,
            db,
        ),
        DocumentChunk::fts_search(
            config.candidates,
            question,
            source_ids,
            config.per_source_limit,
            db,
        ),
    )?;
    let search_ms = search_started.elapsed().as_millis();

    debug!(
        vector_candidates = vector_results.len(),
        lexical_candidates = lexical_results.len(),
        "hybrid search arm sizes"
    );

    let mut pool = merge_candidates(vector_results, lexical_results, config.alpha);
    let pool_size = pool.len();
    pool.truncate(config.candidates);

    if config.rerank_enabled {
        reranker::rerank(&mut pool, question, config.rerank_snippet_chars);
    } else {
        reranker::passthrough(&mut pool);
    }

    let selected = if config.mmr_enabled {
        attach_missing_embeddings(&mut pool, db).await?;
        mmr::select_diverse(pool, config.max_chunks, config.mmr_lambda)
    } else {
        mmr::select_top_k(pool, config.max_chunks)
    };

    info!(
        pool = pool_size,
        selected = selected.len(),
        embed_ms = u64::try_from(embed_ms).unwrap_or(u64::MAX),
        search_ms = u64::try_from(search_ms).unwrap_or(u64::MAX),
        "retrieval finished"
    );

    Ok(RetrievalOutcome {
        selected,
        pool_size,
        query_embedding,
    })
}

/// Merge the two arms by chunk id, min-max normalize each arm's scores, and
/// order by the hybrid blend.
fn merge_candidates(
    vector_results: Vec<common::storage::types::chunk::ChunkSearchResult>,
    lexical_results: Vec<common::storage::types::chunk::ChunkSearchResult>,
    alpha: f32,
) -> Vec<Candidate> {
    let vector_normalized =
        scoring::min_max_normalize(&vector_results.iter().map(|r| r.score).collect::<Vec<_>>());
    let lexical_normalized =
        scoring::min_max_normalize(&lexical_results.iter().map(|r| r.score).collect::<Vec<_>>());

    let mut by_id: HashMap<String, Candidate> = HashMap::new();

    for (result, normalized) in vector_results.into_iter().zip(vector_normalized) {
        let entry = by_id
            .entry(result.chunk.id.clone())
            .or_insert_with(|| Candidate::new(result.chunk.clone()));
        entry.scores.vector = Some(result.score);
        entry.normalized.vector = Some(normalized);
        if entry.embedding.is_none() {
            entry.embedding = result.embedding;
        }
    }

    for (result, normalized) in lexical_results.into_iter().zip(lexical_normalized) {
        let entry = by_id
            .entry(result.chunk.id.clone())
            .or_insert_with(|| Candidate::new(result.chunk.clone()));
        entry.scores.lexical = Some(result.score);
        entry.normalized.lexical = Some(normalized);
    }

    let mut merged: Vec<Candidate> = by_id
        .into_values()
        .map(|mut candidate| {
            candidate.hybrid = scoring::hybrid_score(&candidate.normalized, alpha);
            candidate
        })
        .collect();

    scoring::sort_by_hybrid_desc(&mut merged);
    merged
}

/// Lexical-only candidates come back without vectors; MMR needs them for
/// the redundancy term.
async fn attach_missing_embeddings(
    pool: &mut [Candidate],
    db: &SurrealDbClient,
) -> Result<(), AppError> {
    let missing: Vec<String> = pool
        .iter()
        .filter(|candidate| candidate.embedding.is_none())
        .map(|candidate| candidate.chunk.id.clone())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    let fetched = ChunkEmbedding::get_many(&missing, db).await?;
    for candidate in pool.iter_mut() {
        if candidate.embedding.is_none() {
            candidate.embedding = fetched.get(&candidate.chunk.id).cloned();
        }
    }

    Ok(())
}
