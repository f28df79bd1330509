use common::storage::types::answer::{
    AnswerStyle, Citation, CitationGroup, Claim, VerificationSummary,
};
use serde::{Deserialize, Serialize};

/// The wire-facing answer artifact. Always produced through the hydrator so
/// even legacy rows come out normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer_id: String,
    pub query_id: String,
    pub answer_text: String,
    pub citations: Vec<Citation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_groups: Option<Vec<CitationGroup>>,
    pub citations_count: usize,
    pub claims: Vec<Claim>,
    pub verification_summary: VerificationSummary,
    pub answer_style: AnswerStyle,
    pub raw_citations: serde_json::Value,
}

impl AnswerResponse {
    /// Group citations by source, preserving the within-group citation
    /// order and the order sources first appear.
    pub fn with_groups(mut self) -> Self {
        let mut groups: Vec<CitationGroup> = Vec::new();

        for citation in &self.citations {
            match groups
                .iter_mut()
                .find(|group| group.source_id == citation.source_id)
            {
                Some(group) => group.citations.push(citation.clone()),
                None => groups.push(CitationGroup {
                    source_id: citation.source_id.clone(),
                    source_title: citation.source_title.clone(),
                    citations: vec![citation.clone()],
                }),
            }
        }

        self.citation_groups = Some(groups);
        self
    }
}
