use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};
use uuid::Uuid;

/// Per-claim judgement derived from support/contradiction scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Supports,
    WeakSupport,
    Unsupported,
    Contradicted,
    Conflicting,
}

/// Answer-level judgement over all claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallVerdict {
    Supported,
    WeaklySupported,
    Unsupported,
    Contradicted,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStyle {
    Direct,
    InsufficientEvidence,
    Contradictions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceRelation {
    Supports,
    Contradicts,
    Related,
}

/// A snippet of chunk text backing (or undermining) a claim. Highlight
/// offsets index the stored full chunk text and are independent of the
/// snippet offsets.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Evidence {
    pub chunk_id: String,
    pub relation: EvidenceRelation,
    pub snippet: String,
    #[serde(default)]
    pub snippet_start: Option<usize>,
    #[serde(default)]
    pub snippet_end: Option<usize>,
    #[serde(default)]
    pub highlight_start: Option<usize>,
    #[serde(default)]
    pub highlight_end: Option<usize>,
    #[serde(default)]
    pub highlight_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Claim {
    pub text: String,
    pub verdict: Verdict,
    pub support_score: f32,
    pub contradiction_score: f32,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VerificationSummary {
    pub supported_count: usize,
    pub weak_support_count: usize,
    pub unsupported_count: usize,
    pub contradicted_count: usize,
    pub conflicting_count: usize,
    pub has_contradictions: bool,
    pub overall_verdict: OverallVerdict,
    pub answer_style: AnswerStyle,
}

/// An expanded citation pointing into a chunk. `absolute_*` offsets address
/// the cleaned source text and are null when the chunk predates offset
/// tracking.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Citation {
    pub chunk_id: String,
    pub source_id: String,
    #[serde(default)]
    pub source_title: Option<String>,
    #[serde(default)]
    pub page_start: Option<u32>,
    #[serde(default)]
    pub page_end: Option<u32>,
    #[serde(default)]
    pub section_path: Vec<String>,
    pub snippet: String,
    pub snippet_start: usize,
    pub snippet_end: usize,
    #[serde(default)]
    pub absolute_start: Option<usize>,
    #[serde(default)]
    pub absolute_end: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CitationGroup {
    pub source_id: String,
    #[serde(default)]
    pub source_title: Option<String>,
    pub citations: Vec<Citation>,
}

stored_object!(AnswerRecord, "answer", {
    query_id: String,
    /// Sources the answer drew from; used by the delete cascade.
    source_ids: Vec<String>,
    question: String,
    answer_text: String,
    /// The model's citation payload as it arrived. Kept lenient on purpose;
    /// reads normalize through the hydrator.
    raw_citations: serde_json::Value,
    citations: Vec<Citation>,
    claims: Vec<Claim>,
    verification_summary: Option<VerificationSummary>,
    answer_style: Option<AnswerStyle>
});

impl AnswerRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        query_id: String,
        source_ids: Vec<String>,
        question: String,
        answer_text: String,
        raw_citations: serde_json::Value,
        citations: Vec<Citation>,
        claims: Vec<Claim>,
        verification_summary: Option<VerificationSummary>,
        answer_style: Option<AnswerStyle>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            query_id,
            source_ids,
            question,
            answer_text,
            raw_citations,
            citations,
            claims,
            verification_summary,
            answer_style,
        }
    }

    pub async fn get_required(id: &str, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.get_item::<Self>(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("answer {id} does not exist")))
    }
}
