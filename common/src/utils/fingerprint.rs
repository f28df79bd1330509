use sha2::{Digest, Sha256};

/// Deterministic fingerprint over a query's identity: normalized question,
/// sorted source ids, and the mode flags. Two requests with the same
/// fingerprint are the same question and may share an answer.
pub fn query_fingerprint(
    question: &str,
    source_ids: &[String],
    verify: bool,
    highlights: bool,
    rerank: bool,
) -> String {
    let mut sorted_ids: Vec<&str> = source_ids.iter().map(String::as_str).collect();
    sorted_ids.sort_unstable();
    sorted_ids.dedup();

    let mut hasher = Sha256::new();
    hasher.update(normalize_question(question).as_bytes());
    hasher.update([0u8]);
    for id in sorted_ids {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update([u8::from(verify), u8::from(highlights), u8::from(rerank)]);

    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Collapse whitespace runs and case so trivial retyping maps to the same
/// fingerprint.
fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
