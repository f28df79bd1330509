use crate::scoring::{clamp_unit, sort_by_relevance_desc, Candidate};

/// Weights for the three lexical features. They only need to produce a
/// stable, sensible ordering, not calibrated probabilities.
const TF_WEIGHT: f32 = 0.55;
const PHRASE_WEIGHT: f32 = 0.30;
const LENGTH_WEIGHT: f32 = 0.15;

/// Pure cross-encoder-style stand-in: scores each candidate from the
/// question and a truncated snippet using token-overlap features. No I/O
/// happens here, which keeps the whole query path deterministic under the
/// fake provider.
pub fn rerank(candidates: &mut Vec<Candidate>, question: &str, snippet_chars: usize) {
    let terms = question_terms(question);
    let ordered_tokens = question_tokens(question);

    for candidate in candidates.iter_mut() {
        let snippet: String = candidate
            .chunk
            .text
            .chars()
            .take(snippet_chars.max(1))
            .collect();
        candidate.relevance = rerank_score(&terms, &ordered_tokens, &snippet, snippet_chars);
    }

    sort_by_relevance_desc(candidates);
}

/// Keep the hybrid ordering; the bypass used when reranking is disabled.
pub fn passthrough(candidates: &mut [Candidate]) {
    for candidate in candidates.iter_mut() {
        candidate.relevance = candidate.hybrid;
    }
}

fn rerank_score(
    terms: &[String],
    ordered_tokens: &[String],
    snippet: &str,
    snippet_chars: usize,
) -> f32 {
    let lower = snippet.to_lowercase();

    let tf = term_frequency_overlap(terms, &lower);
    let phrase = ordered_phrase_bonus(ordered_tokens, &lower);
    let length_penalty =
        snippet_chars as f32 / (snippet_chars as f32 + snippet.chars().count() as f32);

    clamp_unit(
        tf.mul_add(
            TF_WEIGHT,
            phrase.mul_add(PHRASE_WEIGHT, length_penalty * LENGTH_WEIGHT),
        ),
    )
}

/// Normalized term-frequency overlap: each question term contributes up to
/// three occurrences, so one spammy term cannot dominate.
fn term_frequency_overlap(terms: &[String], lower_snippet: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }

    let mut total = 0.0f32;
    for term in terms {
        let count = lower_snippet.matches(term.as_str()).count().min(3);
        total += count as f32 / 3.0;
    }
    total / terms.len() as f32
}

/// Fraction of the question's adjacent token pairs that appear verbatim in
/// the snippet.
fn ordered_phrase_bonus(ordered_tokens: &[String], lower_snippet: &str) -> f32 {
    if ordered_tokens.len() < 2 {
        return 0.0;
    }

    let mut hits = 0usize;
    let pairs = ordered_tokens.len() - 1;
    for pair in ordered_tokens.windows(2) {
        let phrase = format!("{} {}", pair[0], pair[1]);
        if lower_snippet.contains(&phrase) {
            hits += 1;
        }
    }
    hits as f32 / pairs as f32
}

fn question_terms(question: &str) -> Vec<String> {
    let mut terms: Vec<String> = question_tokens(question);
    terms.sort();
    terms.dedup();
    terms
}

fn question_tokens(question: &str) -> Vec<String> {
    question
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|token| token.len() >= 3)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::chunk::DocumentChunk;

    fn candidate(text: &str, hybrid: f32) -> Candidate {
        let chunk = DocumentChunk::new(
            "src".to_string(),
            0,
            text.to_string(),
            0,
            text.len(),
            None,
            None,
            Vec::new(),
        );
        let mut candidate = Candidate::new(chunk);
        candidate.hybrid = hybrid;
        candidate
    }

    #[test]
    fn overlapping_chunks_outrank_unrelated_ones() {
        let mut candidates = vec![
            candidate("the annual rainfall statistics for the region", 0.9),
            candidate("river trade flourished along the main waterways", 0.1),
        ];
        rerank(&mut candidates, "how did river trade develop", 900);

        assert!(candidates[0].chunk.text.contains("river trade"));
        assert!(candidates[0].relevance > candidates[1].relevance);
    }

    #[test]
    fn phrase_matches_beat_scattered_terms() {
        let mut candidates = vec![
            candidate("trade river backwards mention with gaps between", 0.5),
            candidate("the river trade corridor is described here", 0.5),
        ];
        rerank(&mut candidates, "river trade corridor", 900);

        assert!(candidates[0].chunk.text.contains("river trade corridor"));
    }

    #[test]
    fn shorter_chunks_win_on_equal_overlap() {
        let long_tail = " filler".repeat(300);
        let mut candidates = vec![
            candidate(&format!("river trade answer.{long_tail}"), 0.5),
            candidate("river trade answer.", 0.5),
        ];
        rerank(&mut candidates, "river trade", 900);

        assert!(candidates[0].chunk.text.len() < candidates[1].chunk.text.len());
    }

    #[test]
    fn passthrough_uses_hybrid_as_relevance() {
        let mut candidates = vec![candidate("anything", 0.42)];
        passthrough(&mut candidates);
        assert!((candidates[0].relevance - 0.42).abs() < 1e-6);
    }

    #[test]
    fn rerank_is_deterministic() {
        let build = || {
            vec![
                candidate("alpha beta gamma", 0.3),
                candidate("beta gamma delta", 0.3),
                candidate("gamma delta epsilon", 0.3),
            ]
        };
        let mut a = build();
        let mut b = build();
        rerank(&mut a, "beta gamma", 900);
        rerank(&mut b, "beta gamma", 900);

        let ids_a: Vec<&str> = a.iter().map(|c| c.chunk.text.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|c| c.chunk.text.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
