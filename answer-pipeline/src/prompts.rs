use common::providers::{
    CLAIM_SCORE_INSTRUCTION, CLAIM_SPLIT_INSTRUCTION, SYNTHESIS_INSTRUCTION,
};
use retrieval_pipeline::Candidate;

pub const SYNTHESIS_SYSTEM_PROMPT: &str =
    "You answer questions strictly from supplied document chunks and cite the chunk ids you used.";

pub const VERIFIER_SYSTEM_PROMPT: &str =
    "You decompose answers into claims and judge claims against document evidence.";

/// Chunk blocks are one line each so both the real model and the fake can
/// parse them unambiguously.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn synthesis_prompt(question: &str, selected: &[Candidate]) -> String {
    let mut prompt = String::new();
    prompt.push_str(SYNTHESIS_INSTRUCTION);
    prompt.push_str(
        " If the chunks do not contain the answer, reply with the exact words \"I don't know\".\n",
    );
    prompt.push_str(
        "Respond with a JSON object {\"answer\": string, \"citations\": [chunk_id, ...]}.\n\nChunks:\n",
    );

    for candidate in selected {
        prompt.push_str("[CHUNK ");
        prompt.push_str(&candidate.chunk.id);
        prompt.push_str("]: ");
        prompt.push_str(&single_line(&candidate.chunk.text));
        prompt.push('\n');
    }

    prompt.push_str("\nQuestion:\n");
    prompt.push_str(question);
    prompt
}

pub fn claim_split_prompt(answer_text: &str) -> String {
    format!(
        "{CLAIM_SPLIT_INSTRUCTION}, each a short noun-phrase plus predicate sentence.\nRespond with a JSON object {{\"claims\": [string, ...]}}.\n\nAnswer:\n{answer_text}"
    )
}

/// Evidence blocks carry the chunk id and a truncated single-line body.
pub fn claim_score_prompt(claim: &str, evidence: &[(String, String)]) -> String {
    let mut prompt = format!(
        "{CLAIM_SCORE_INSTRUCTION}.\nRespond with a JSON object {{\"support_score\": number, \"contradiction_score\": number, \"evidence\": [{{\"chunk_id\": string, \"relation\": \"supports\"|\"contradicts\"|\"related\", \"snippet\": string}}]}}.\n\nClaim:\n{claim}\n\nEvidence:\n"
    );

    for (chunk_id, text) in evidence {
        prompt.push_str("[EVIDENCE ");
        prompt.push_str(chunk_id);
        prompt.push_str("]: ");
        prompt.push_str(&single_line(text));
        prompt.push('\n');
    }

    prompt
}
