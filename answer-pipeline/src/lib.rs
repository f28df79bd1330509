#![allow(clippy::missing_docs_in_private_items)]

pub mod highlight;
pub mod hydrator;
pub mod prompts;
pub mod response;
pub mod rewriter;
pub mod snippet;
pub mod synthesizer;
pub mod verdict;
pub mod verifier;

use std::collections::HashMap;

use common::{
    error::AppError,
    providers::AiProvider,
    storage::{
        db::SurrealDbClient,
        types::{
            answer::{AnswerRecord, AnswerStyle},
            query_record::QueryRecord,
            source::Source,
        },
    },
    utils::{config::AppConfig, fingerprint::query_fingerprint},
};
use retrieval_pipeline::{retrieve, RetrievalConfig};
use tracing::{info, instrument};

use crate::{
    hydrator::hydrate_answer,
    response::AnswerResponse,
    rewriter::rewrite_contradicted_answer,
    synthesizer::{synthesize, SynthesizerConfig},
    verdict::summarize,
    verifier::{verify_answer, VerifierConfig},
};

/// Per-request mode flags. `rerank` overrides the service default when set.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    pub verify: bool,
    pub highlights: bool,
    pub rerank: Option<bool>,
}

/// The full query path: resolve sources, retrieve, synthesize, optionally
/// verify and rewrite, persist, and hydrate the stored row into the
/// response. Everything downstream of retrieval is pure given the provider
/// output, so fake-provider runs are byte-for-byte reproducible.
#[instrument(skip_all, fields(verify = options.verify, highlights = options.highlights))]
pub async fn answer_query(
    db: &SurrealDbClient,
    provider: &AiProvider,
    config: &AppConfig,
    question: &str,
    source_ids: &[String],
    options: QueryOptions,
) -> Result<AnswerResponse, AppError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("question must not be empty".into()));
    }

    let resolved = Source::resolve_ready_ids(source_ids, db).await?;
    if resolved.is_empty() {
        return Err(AppError::Unprocessable(
            "no READY sources match the request".into(),
        ));
    }

    let mut retrieval_config = RetrievalConfig::from_app_config(config);
    if let Some(rerank) = options.rerank {
        retrieval_config.rerank_enabled = rerank;
    }

    let fingerprint = query_fingerprint(
        question,
        &resolved,
        options.verify,
        options.highlights,
        retrieval_config.rerank_enabled,
    );
    let query = QueryRecord::new(
        fingerprint,
        question.to_string(),
        resolved.clone(),
        options.verify,
        options.highlights,
        retrieval_config.rerank_enabled,
    );
    let query_id = query.id.clone();
    db.store_item(query).await?;

    let outcome = retrieve(db, provider, question, &resolved, &retrieval_config).await?;

    let sources = load_sources(db, &resolved).await?;
    let synthesizer_config = SynthesizerConfig {
        snippet_chars: config.rerank_snippet_chars,
        debug: config.debug,
    };
    let synthesis = synthesize(
        provider,
        question,
        &outcome.selected,
        &sources,
        &synthesizer_config,
    )
    .await?;

    let mut answer_text = synthesis.answer_text;
    let mut answer_style = synthesis.answer_style;
    let mut claims = Vec::new();
    let mut summary = None;

    if options.verify && answer_style == AnswerStyle::Direct {
        let cited_chunks: Vec<_> = outcome
            .selected
            .iter()
            .filter(|candidate| synthesis.cited_chunk_ids.contains(&candidate.chunk.id))
            .map(|candidate| candidate.chunk.clone())
            .collect();

        let verifier_config = VerifierConfig {
            snippet_chars: config.rerank_snippet_chars,
            highlights: options.highlights,
        };
        claims = verify_answer(
            db,
            provider,
            &answer_text,
            &cited_chunks,
            &resolved,
            &retrieval_config,
            &verifier_config,
        )
        .await?;

        let computed = summarize(&claims, answer_style);
        if computed.has_contradictions {
            answer_text = rewrite_contradicted_answer(&claims);
            answer_style = AnswerStyle::Contradictions;
        }
        summary = Some(computed);
    }

    let record = AnswerRecord::new(
        query_id.clone(),
        resolved,
        question.to_string(),
        answer_text,
        synthesis.raw_citations,
        synthesis.citations,
        claims,
        summary,
        Some(answer_style),
    );
    let answer_id = record.id.clone();
    db.store_item(record.clone()).await?;
    QueryRecord::set_answer_id(&query_id, &answer_id, db).await?;

    info!(
        %answer_id,
        style = ?answer_style,
        citations = record.citations.len(),
        claims = record.claims.len(),
        "answer persisted"
    );

    Ok(hydrate_answer(record))
}

async fn load_sources(
    db: &SurrealDbClient,
    source_ids: &[String],
) -> Result<HashMap<String, Source>, AppError> {
    let mut sources = HashMap::new();
    for id in source_ids {
        if let Some(source) = db.get_item::<Source>(id).await? {
            sources.insert(source.id.clone(), source);
        }
    }
    Ok(sources)
}
