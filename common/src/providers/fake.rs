use serde_json::json;
use sha2::{Digest, Sha256};

use super::{
    ChatOutcome, TokenUsage, CLAIM_SCORE_INSTRUCTION, CLAIM_SPLIT_INSTRUCTION,
    SYNTHESIS_INSTRUCTION,
};

/// Offline stand-in for the model stack. Embeddings are bags of hashed
/// tokens, chat is a set of lexical heuristics keyed off the prompt's
/// instruction marker. Everything here is a pure function of its input, so
/// identical queries produce byte-identical answers, claims, and verdicts.
#[derive(Clone)]
pub struct FakeAi {
    dimension: usize,
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "what", "which", "their", "there",
    "about", "into", "have", "has", "was", "were", "are", "is", "of", "to", "in", "on", "a",
    "an", "it", "its", "as", "by", "be", "or", "does", "did", "do", "how", "why", "when",
    "where", "who", "whom", "will", "would", "can", "could", "should", "than", "then", "also",
];

const NEGATION_MARKERS: &[&str] = &[
    "not", "no", "never", "cannot", "n't", "contrary", "however", "false", "incorrect",
    "deny", "denies", "refute", "refutes", "dispute", "disputes", "disproven", "without",
];

impl FakeAi {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Bag-of-hashed-tokens embedding: each token contributes a pseudorandom
    /// unit direction seeded from its hash, so texts sharing vocabulary land
    /// near each other while staying fully reproducible.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut acc = vec![0.0f64; self.dimension];
        let mut any = false;

        for token in tokenize(text) {
            any = true;
            let digest = Sha256::digest(token.as_bytes());
            let mut state = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]);
            for slot in acc.iter_mut() {
                state = splitmix64(state);
                let unit = (state as f64 / u64::MAX as f64).mul_add(2.0, -1.0);
                *slot += unit;
            }
        }

        if !any {
            let mut empty = vec![0.0f32; self.dimension];
            if let Some(first) = empty.first_mut() {
                *first = 1.0;
            }
            return empty;
        }

        let norm = acc.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm <= f64::EPSILON {
            let mut fallback = vec![0.0f32; self.dimension];
            if let Some(first) = fallback.first_mut() {
                *first = 1.0;
            }
            return fallback;
        }

        acc.into_iter().map(|v| (v / norm) as f32).collect()
    }

    pub fn chat(&self, prompt: &str) -> ChatOutcome {
        let text = if prompt.contains(CLAIM_SCORE_INSTRUCTION) {
            self.score_claim(prompt)
        } else if prompt.contains(CLAIM_SPLIT_INSTRUCTION) {
            self.split_claims(prompt)
        } else if prompt.contains(SYNTHESIS_INSTRUCTION) {
            self.synthesize(prompt)
        } else {
            json!({"answer": "I don't know", "citations": []}).to_string()
        };

        let usage = TokenUsage {
            prompt_tokens: u32::try_from(prompt.len() / 4).unwrap_or(u32::MAX),
            completion_tokens: u32::try_from(text.len() / 4).unwrap_or(u32::MAX),
        };

        ChatOutcome { text, usage }
    }

    fn synthesize(&self, prompt: &str) -> String {
        let chunks = parse_labeled_blocks(prompt, "[CHUNK ");
        let question = section_after(prompt, "Question:");
        let question_terms = content_terms(&question);

        let mut scored: Vec<(usize, &(String, String))> = chunks
            .iter()
            .map(|entry| (overlap_count(&question_terms, &entry.1), entry))
            .collect();
        // Stable by prompt order, so equal overlap keeps the retrieval ranking.
        scored.sort_by_key(|(overlap, _)| std::cmp::Reverse(*overlap));

        let relevant: Vec<&(String, String)> = scored
            .iter()
            .filter(|(overlap, _)| *overlap > 0)
            .map(|(_, entry)| *entry)
            .collect();

        if relevant.is_empty() {
            return json!({"answer": "I don't know", "citations": []}).to_string();
        }

        let best_text = &relevant[0].1;
        let answer: String = split_sentences(best_text)
            .into_iter()
            .take(2)
            .collect::<Vec<_>>()
            .join(" ");
        let citations: Vec<&str> = relevant.iter().take(2).map(|(id, _)| id.as_str()).collect();

        json!({"answer": answer, "citations": citations}).to_string()
    }

    fn split_claims(&self, prompt: &str) -> String {
        let answer = section_after(prompt, "Answer:");
        let claims: Vec<String> = split_sentences(&answer)
            .into_iter()
            .filter(|sentence| sentence.chars().filter(char::is_ascii_alphanumeric).count() >= 3)
            .take(8)
            .map(str::to_string)
            .collect();

        json!({ "claims": claims }).to_string()
    }

    fn score_claim(&self, prompt: &str) -> String {
        let claim = section_after_until(prompt, "Claim:", "Evidence:");
        let evidence_blocks = parse_labeled_blocks(prompt, "[EVIDENCE ");

        let claim_terms = content_terms(&claim);
        let claim_negated = has_negation(&claim);

        let mut support: f32 = 0.0;
        let mut contradiction: f32 = 0.0;
        let mut evidence_out: Vec<(String, &'static str, String, f32)> = Vec::new();

        for (chunk_id, text) in &evidence_blocks {
            let mut best_for_block: Option<(&'static str, String, f32)> = None;

            for sentence in split_sentences(text) {
                let ratio = overlap_ratio(&claim_terms, sentence);
                if ratio <= 0.0 {
                    continue;
                }

                // Polarity mismatch between claim and sentence reads as a
                // contradiction; agreement reads as support.
                let mismatch = claim_negated != has_negation(sentence);
                let (relation, strength) = if mismatch {
                    ("contradicts", ratio)
                } else {
                    ("supports", ratio)
                };

                if mismatch {
                    contradiction = contradiction.max(ratio);
                } else {
                    support = support.max(ratio);
                }

                let replace = best_for_block
                    .as_ref()
                    .map(|(_, _, prev)| strength > *prev)
                    .unwrap_or(true);
                if replace {
                    best_for_block = Some((relation, sentence.to_string(), strength));
                }
            }

            if let Some((relation, sentence, strength)) = best_for_block {
                evidence_out.push((chunk_id.clone(), relation, sentence, strength));
            }
        }

        evidence_out.sort_by(|a, b| {
            b.3.partial_cmp(&a.3)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        evidence_out.truncate(3);

        let evidence_json: Vec<serde_json::Value> = evidence_out
            .into_iter()
            .map(|(chunk_id, relation, snippet, strength)| {
                let relation = if strength < 0.25 { "related" } else { relation };
                json!({"chunk_id": chunk_id, "relation": relation, "snippet": snippet})
            })
            .collect();

        json!({
            "support_score": support,
            "contradiction_score": contradiction,
            "evidence": evidence_json,
        })
        .to_string()
    }
}

fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|raw| raw.len() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// Lowercased content words: at least three chars, no stopwords, deduped.
pub fn content_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|term| term.len() >= 3 && !STOPWORDS.contains(&term.as_str()))
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

fn overlap_count(terms: &[String], haystack: &str) -> usize {
    let lower = haystack.to_lowercase();
    terms.iter().filter(|term| lower.contains(term.as_str())).count()
}

fn overlap_ratio(terms: &[String], haystack: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    overlap_count(terms, haystack) as f32 / terms.len() as f32
}

fn has_negation(text: &str) -> bool {
    let lower = text.to_lowercase();
    NEGATION_MARKERS.iter().any(|marker| {
        lower
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .any(|word| word == *marker)
    })
}

/// Split into trimmed sentences on `.`, `!`, `?`, and newlines.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split_inclusive(|c: char| matches!(c, '.' | '!' | '?' | '\n'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `[<label><id>]: <text>` lines, e.g. `[CHUNK abc123]: some text`.
fn parse_labeled_blocks(prompt: &str, label_prefix: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    for line in prompt.lines() {
        let Some(rest) = line.trim_start().strip_prefix(label_prefix) else {
            continue;
        };
        let Some(close) = rest.find("]:") else {
            continue;
        };
        let id = rest[..close].trim().to_string();
        let text = rest[close + 2..].trim().to_string();
        if !id.is_empty() {
            blocks.push((id, text));
        }
    }
    blocks
}

/// Everything after the first occurrence of `header` (on its own line or
/// inline), trimmed.
fn section_after(prompt: &str, header: &str) -> String {
    prompt
        .find(header)
        .map(|at| prompt[at + header.len()..].trim().to_string())
        .unwrap_or_default()
}

fn section_after_until(prompt: &str, header: &str, terminator: &str) -> String {
    let tail = section_after(prompt, header);
    tail.find(terminator)
        .map(|at| tail[..at].trim().to_string())
        .unwrap_or(tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (na * nb)
    }

    #[test]
    fn embeddings_are_deterministic_and_unit_length() {
        let fake = FakeAi::new(64);
        let a = fake.embed_one("tokio uses cooperative scheduling");
        let b = fake.embed_one("tokio uses cooperative scheduling");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn shared_vocabulary_scores_higher_cosine() {
        let fake = FakeAi::new(128);
        let query = fake.embed_one("rust async runtime scheduling");
        let near = fake.embed_one("the rust async runtime handles scheduling of tasks");
        let far = fake.embed_one("baking sourdough bread requires patience");
        assert!(cosine(&query, &near) > cosine(&query, &far));
    }

    #[test]
    fn synthesis_cites_overlapping_chunks() {
        let fake = FakeAi::new(8);
        let prompt = format!(
            "{SYNTHESIS_INSTRUCTION}\n\nChunks:\n[CHUNK c1]: The thesis argues that rivers shaped trade routes.\n[CHUNK c2]: Weather patterns are discussed briefly.\n\nQuestion:\nWhat shaped trade routes?"
        );
        let outcome = fake.chat(&prompt);
        let parsed: serde_json::Value = serde_json::from_str(&outcome.text).expect("json");
        assert!(parsed["answer"].as_str().expect("answer").contains("rivers"));
        assert_eq!(parsed["citations"][0], "c1");
    }

    #[test]
    fn synthesis_without_overlap_declines_to_answer() {
        let fake = FakeAi::new(8);
        let prompt = format!(
            "{SYNTHESIS_INSTRUCTION}\n\nChunks:\n[CHUNK c1]: Completely unrelated content.\n\nQuestion:\nzzz nonexistent quasar"
        );
        let outcome = fake.chat(&prompt);
        let parsed: serde_json::Value = serde_json::from_str(&outcome.text).expect("json");
        assert_eq!(parsed["answer"], "I don't know");
        assert_eq!(parsed["citations"].as_array().expect("array").len(), 0);
    }

    #[test]
    fn claim_split_returns_sentences() {
        let fake = FakeAi::new(8);
        let prompt = format!(
            "{CLAIM_SPLIT_INSTRUCTION}.\n\nAnswer:\nRivers shaped trade. Mountains blocked armies."
        );
        let outcome = fake.chat(&prompt);
        let parsed: serde_json::Value = serde_json::from_str(&outcome.text).expect("json");
        let claims = parsed["claims"].as_array().expect("claims");
        assert_eq!(claims.len(), 2);
        assert!(claims[0].as_str().expect("str").contains("Rivers"));
    }

    #[test]
    fn negated_evidence_produces_contradiction_scores() {
        let fake = FakeAi::new(8);
        let prompt = format!(
            "{CLAIM_SCORE_INSTRUCTION}.\n\nClaim:\nRivers shaped ancient trade routes.\n\nEvidence:\n[EVIDENCE e1]: Rivers never shaped ancient trade routes in this region."
        );
        let outcome = fake.chat(&prompt);
        let parsed: serde_json::Value = serde_json::from_str(&outcome.text).expect("json");
        let contradiction = parsed["contradiction_score"].as_f64().expect("score");
        assert!(contradiction >= 0.6, "got {contradiction}");
        assert_eq!(parsed["evidence"][0]["relation"], "contradicts");
    }

    #[test]
    fn supporting_evidence_produces_support_scores() {
        let fake = FakeAi::new(8);
        let prompt = format!(
            "{CLAIM_SCORE_INSTRUCTION}.\n\nClaim:\nRivers shaped ancient trade routes.\n\nEvidence:\n[EVIDENCE e1]: Rivers shaped ancient trade routes across the basin."
        );
        let outcome = fake.chat(&prompt);
        let parsed: serde_json::Value = serde_json::from_str(&outcome.text).expect("json");
        let support = parsed["support_score"].as_f64().expect("score");
        assert!(support >= 0.6, "got {support}");
        assert_eq!(parsed["evidence"][0]["relation"], "supports");
    }

    #[test]
    fn chat_is_deterministic() {
        let fake = FakeAi::new(8);
        let prompt = format!(
            "{SYNTHESIS_INSTRUCTION}\n\nChunks:\n[CHUNK c1]: Tokio schedules tasks cooperatively.\n\nQuestion:\nHow does tokio schedule tasks?"
        );
        assert_eq!(fake.chat(&prompt).text, fake.chat(&prompt).text);
    }
}
