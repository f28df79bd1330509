use std::collections::HashMap;

use common::{
    error::AppError,
    providers::AiProvider,
    storage::{
        db::SurrealDbClient,
        types::{
            answer::{Claim, Evidence, EvidenceRelation},
            chunk::DocumentChunk,
        },
    },
};
use retrieval_pipeline::{retrieve, RetrievalConfig};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::{
    highlight::{highlight_text, locate_highlight},
    prompts::{claim_score_prompt, claim_split_prompt, VERIFIER_SYSTEM_PROMPT},
    snippet::query_terms,
    verdict::derive_verdict,
};

/// How many chunks a fresh per-claim retrieval may add to the evidence pool.
const CLAIM_RETRIEVAL_CHUNKS: usize = 3;

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub snippet_chars: usize,
    /// Compute highlight offsets for evidence (highlights endpoints only).
    pub highlights: bool,
}

#[derive(Debug, Deserialize)]
struct ModelClaims {
    claims: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModelScore {
    #[serde(default)]
    support_score: f32,
    #[serde(default)]
    contradiction_score: f32,
    #[serde(default)]
    evidence: Vec<ModelEvidence>,
}

#[derive(Debug, Deserialize)]
struct ModelEvidence {
    chunk_id: String,
    #[serde(default)]
    relation: Option<EvidenceRelation>,
    #[serde(default)]
    snippet: String,
}

/// Decompose the answer into claims and score each against the evidence.
/// Cited chunks are always in the pool; when none of them mention a claim,
/// a fresh retrieval restricted to the query's sources fills the gap.
#[instrument(skip_all, fields(cited = cited_chunks.len()))]
pub async fn verify_answer(
    db: &SurrealDbClient,
    provider: &AiProvider,
    answer_text: &str,
    cited_chunks: &[DocumentChunk],
    source_ids: &[String],
    retrieval_config: &RetrievalConfig,
    config: &VerifierConfig,
) -> Result<Vec<Claim>, AppError> {
    let claim_texts = extract_claims(provider, answer_text).await?;
    debug!(claims = claim_texts.len(), "extracted claims");

    let mut claims = Vec::with_capacity(claim_texts.len());
    for claim_text in claim_texts {
        let claim = score_claim(
            db,
            provider,
            &claim_text,
            cited_chunks,
            source_ids,
            retrieval_config,
            config,
        )
        .await?;
        claims.push(claim);
    }

    Ok(claims)
}

/// Ask the model to split the answer; fall back to a sentence split when the
/// output is unusable so verified mode degrades instead of erroring.
async fn extract_claims(
    provider: &AiProvider,
    answer_text: &str,
) -> Result<Vec<String>, AppError> {
    let prompt = claim_split_prompt(answer_text);
    let outcome = provider.chat(VERIFIER_SYSTEM_PROMPT, &prompt).await?;

    match serde_json::from_str::<ModelClaims>(&outcome.text) {
        Ok(parsed) if !parsed.claims.is_empty() => Ok(parsed.claims),
        Ok(_) | Err(_) => {
            warn!("claim split output unusable; splitting sentences instead");
            Ok(answer_text
                .split_inclusive(|c: char| matches!(c, '.' | '!' | '?' | '\n'))
                .map(str::trim)
                .filter(|s| s.chars().filter(char::is_ascii_alphanumeric).count() >= 3)
                .map(str::to_string)
                .collect())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn score_claim(
    db: &SurrealDbClient,
    provider: &AiProvider,
    claim_text: &str,
    cited_chunks: &[DocumentChunk],
    source_ids: &[String],
    retrieval_config: &RetrievalConfig,
    config: &VerifierConfig,
) -> Result<Claim, AppError> {
    let mut evidence_chunks: Vec<DocumentChunk> = cited_chunks.to_vec();

    // When the citations never mention the claim, look for evidence across
    // the allowed sources using the claim itself as the query.
    let claim_terms = query_terms(claim_text);
    let covered = evidence_chunks.iter().any(|chunk| {
        let lower = chunk.text.to_lowercase();
        claim_terms.iter().any(|term| lower.contains(term.as_str()))
    });
    if !covered && !source_ids.is_empty() {
        let mut fresh_config = retrieval_config.clone();
        fresh_config.max_chunks = CLAIM_RETRIEVAL_CHUNKS;
        let fresh = retrieve(db, provider, claim_text, source_ids, &fresh_config).await?;
        for candidate in fresh.selected {
            if !evidence_chunks.iter().any(|c| c.id == candidate.chunk.id) {
                evidence_chunks.push(candidate.chunk);
            }
        }
        debug!(
            pool = evidence_chunks.len(),
            "claim evidence extended by fresh retrieval"
        );
    }

    let blocks: Vec<(String, String)> = evidence_chunks
        .iter()
        .map(|chunk| {
            let truncated: String = chunk.text.chars().take(config.snippet_chars).collect();
            (chunk.id.clone(), truncated)
        })
        .collect();

    let prompt = claim_score_prompt(claim_text, &blocks);
    let outcome = provider.chat(VERIFIER_SYSTEM_PROMPT, &prompt).await?;

    let parsed: ModelScore = match serde_json::from_str(&outcome.text) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "claim scoring output unusable; treating as unscored");
            ModelScore {
                support_score: 0.0,
                contradiction_score: 0.0,
                evidence: Vec::new(),
            }
        }
    };

    let support = parsed.support_score.clamp(0.0, 1.0);
    let contradiction = parsed.contradiction_score.clamp(0.0, 1.0);

    let chunk_by_id: HashMap<&str, &DocumentChunk> = evidence_chunks
        .iter()
        .map(|chunk| (chunk.id.as_str(), chunk))
        .collect();

    let evidence = parsed
        .evidence
        .into_iter()
        .filter_map(|model_evidence| {
            chunk_by_id
                .get(model_evidence.chunk_id.as_str())
                .map(|chunk| build_evidence(model_evidence, chunk, config.highlights))
        })
        .collect();

    Ok(Claim {
        text: claim_text.to_string(),
        verdict: derive_verdict(support, contradiction),
        support_score: support,
        contradiction_score: contradiction,
        evidence,
    })
}

/// Attach snippet offsets (exact match only) and, when asked for, highlight
/// offsets into the stored chunk text.
fn build_evidence(
    model_evidence: ModelEvidence,
    chunk: &DocumentChunk,
    highlights: bool,
) -> Evidence {
    let snippet = model_evidence.snippet.trim().to_string();

    let (snippet_start, snippet_end) = match chunk.text.find(&snippet) {
        Some(byte_at) => {
            let start = chunk.text[..byte_at].chars().count();
            (Some(start), Some(start + snippet.chars().count()))
        }
        None => (None, None),
    };

    let (highlight_start, highlight_end, highlighted) = if highlights {
        match locate_highlight(&chunk.text, &snippet) {
            Some((start, end)) => (
                Some(start),
                Some(end),
                Some(highlight_text(&chunk.text, start, end)),
            ),
            None => (None, None, None),
        }
    } else {
        (None, None, None)
    };

    Evidence {
        chunk_id: chunk.id.clone(),
        relation: model_evidence.relation.unwrap_or(EvidenceRelation::Related),
        snippet,
        snippet_start,
        snippet_end,
        highlight_start,
        highlight_end,
        highlight_text: highlighted,
    }
}
