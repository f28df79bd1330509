use std::collections::{HashMap, HashSet};

use common::{
    error::AppError,
    providers::AiProvider,
    storage::types::{answer::AnswerStyle, answer::Citation, source::Source},
};
use retrieval_pipeline::Candidate;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::{
    prompts::{synthesis_prompt, SYNTHESIS_SYSTEM_PROMPT},
    snippet::{query_terms, select_snippet},
};

pub const INSUFFICIENT_EVIDENCE_TEXT: &str =
    "There is insufficient evidence in the supplied sources to answer this question.";

const MAX_FOLLOW_UPS: usize = 3;

#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    pub snippet_chars: usize,
    /// Strict mode: hallucinated citation ids fail the request instead of
    /// being dropped. Deliberately only for debug/eval runs.
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub answer_text: String,
    pub cited_chunk_ids: Vec<String>,
    pub raw_citations: serde_json::Value,
    pub citations: Vec<Citation>,
    pub answer_style: AnswerStyle,
}

/// Wire shape the model is instructed to produce. Parsed strictly; anything
/// else falls back to the insufficient-evidence answer.
#[derive(Debug, Deserialize)]
struct ModelAnswer {
    answer: String,
    #[serde(default)]
    citations: Vec<String>,
}

/// Build the grounded prompt, call the model, validate its citations, and
/// expand them into citation records. This function never errors on bad
/// model output (outside debug citation mode): the fallback answer is the
/// error path.
#[instrument(skip_all, fields(chunks = selected.len()))]
pub async fn synthesize(
    provider: &AiProvider,
    question: &str,
    selected: &[Candidate],
    sources: &HashMap<String, Source>,
    config: &SynthesizerConfig,
) -> Result<SynthesisOutput, AppError> {
    if selected.is_empty() {
        return Ok(fallback(selected, config));
    }

    let prompt = synthesis_prompt(question, selected);
    let outcome = provider.chat(SYNTHESIS_SYSTEM_PROMPT, &prompt).await?;

    let parsed: ModelAnswer = match serde_json::from_str(&outcome.text) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "model output was not the expected JSON; falling back");
            return Ok(fallback(selected, config));
        }
    };

    let answer_text = parsed.answer.trim().to_string();
    let known_ids: HashSet<&str> = selected
        .iter()
        .map(|candidate| candidate.chunk.id.as_str())
        .collect();
    let cited = validate_citations(parsed.citations, &known_ids, config.debug)?;

    let declined = answer_text.is_empty()
        || answer_text.eq_ignore_ascii_case("i don't know")
        || answer_text.eq_ignore_ascii_case("i don't know.");
    if declined || cited.is_empty() {
        debug!(declined, citations = cited.len(), "empty answer; falling back");
        return Ok(fallback(selected, config));
    }

    let chunk_by_id: HashMap<&str, &Candidate> = selected
        .iter()
        .map(|candidate| (candidate.chunk.id.as_str(), candidate))
        .collect();
    let terms = query_terms(question);

    let citations: Vec<Citation> = cited
        .iter()
        .filter_map(|chunk_id| chunk_by_id.get(chunk_id.as_str()))
        .map(|candidate| expand_citation(candidate, &terms, sources, config.snippet_chars))
        .collect();

    Ok(SynthesisOutput {
        answer_text,
        raw_citations: json!({ "ids": cited }),
        cited_chunk_ids: cited,
        citations,
        answer_style: AnswerStyle::Direct,
    })
}

/// Every cited id must name a supplied chunk. Unknown ids fail the request
/// in debug mode and are silently dropped otherwise (an availability
/// trade-off: a hallucinated id should not take down production answers).
fn validate_citations(
    model_ids: Vec<String>,
    known_ids: &HashSet<&str>,
    debug_mode: bool,
) -> Result<Vec<String>, AppError> {
    let mut seen = HashSet::new();
    let mut valid = Vec::new();

    for id in model_ids {
        if !known_ids.contains(id.as_str()) {
            if debug_mode {
                return Err(AppError::Citation(format!(
                    "model cited unknown chunk id {id}"
                )));
            }
            debug!(chunk_id = %id, "dropping citation of unknown chunk");
            continue;
        }
        if seen.insert(id.clone()) {
            valid.push(id);
        }
    }

    Ok(valid)
}

fn expand_citation(
    candidate: &Candidate,
    terms: &[String],
    sources: &HashMap<String, Source>,
    snippet_chars: usize,
) -> Citation {
    let chunk = &candidate.chunk;
    let span = select_snippet(&chunk.text, terms, snippet_chars);

    Citation {
        chunk_id: chunk.id.clone(),
        source_id: chunk.source_id.clone(),
        source_title: sources.get(&chunk.source_id).map(|s| s.title.clone()),
        page_start: chunk.page_start,
        page_end: chunk.page_end,
        section_path: chunk.section_path.clone(),
        snippet: span.text,
        snippet_start: span.char_start,
        snippet_end: span.char_end,
        absolute_start: Some(chunk.char_start + span.char_start),
        absolute_end: Some(chunk.char_start + span.char_end),
    }
}

/// The canonical no-answer response: the insufficient-evidence message plus
/// up to three follow-up suggestions lifted from the top candidate snippets.
fn fallback(selected: &[Candidate], config: &SynthesizerConfig) -> SynthesisOutput {
    let mut answer_text = INSUFFICIENT_EVIDENCE_TEXT.to_string();

    let suggestions: Vec<String> = selected
        .iter()
        .take(MAX_FOLLOW_UPS)
        .filter_map(|candidate| follow_up_stub(&candidate.chunk.text, config.snippet_chars))
        .collect();

    if !suggestions.is_empty() {
        answer_text.push_str("\n\nSuggested follow-ups:");
        for suggestion in suggestions {
            answer_text.push_str("\n- ");
            answer_text.push_str(&suggestion);
        }
    }

    SynthesisOutput {
        answer_text,
        cited_chunk_ids: Vec::new(),
        raw_citations: json!({ "ids": [] }),
        citations: Vec::new(),
        answer_style: AnswerStyle::InsufficientEvidence,
    }
}

fn follow_up_stub(chunk_text: &str, snippet_chars: usize) -> Option<String> {
    let first_sentence = chunk_text
        .split_inclusive(|c: char| matches!(c, '.' | '!' | '?' | '\n'))
        .map(str::trim)
        .find(|s| !s.is_empty())?;

    let stub: String = first_sentence
        .chars()
        .take(snippet_chars.min(80))
        .collect();
    let stub = stub.trim_end_matches(['.', '!', '?']).trim().to_string();
    if stub.len() < 8 {
        return None;
    }

    Some(format!("What does the source say about \"{stub}\"?"))
}
