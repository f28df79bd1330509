use std::cmp::Ordering;

use common::storage::types::chunk::DocumentChunk;

/// Raw subscores a candidate gathered from the two search arms.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scores {
    pub vector: Option<f32>,
    pub lexical: Option<f32>,
}

/// A chunk moving through the retrieval stages, carrying raw and normalized
/// subscores so later stages never have to re-derive them.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: DocumentChunk,
    pub embedding: Option<Vec<f32>>,
    pub scores: Scores,
    pub normalized: Scores,
    /// Blend of the normalized subscores; the ordering key out of the merge.
    pub hybrid: f32,
    /// Relevance after the rerank stage (equals `hybrid` when reranking is
    /// off or bypassed).
    pub relevance: f32,
}

impl Candidate {
    pub fn new(chunk: DocumentChunk) -> Self {
        Self {
            chunk,
            embedding: None,
            scores: Scores::default(),
            normalized: Scores::default(),
            hybrid: 0.0,
            relevance: 0.0,
        }
    }
}

pub const fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Min-max normalization into [0,1]. All-equal inputs map to 1.0 so a
/// single-arm result still carries weight in the blend.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let mut min = f32::MAX;
    let mut max = f32::MIN;

    for s in scores {
        if !s.is_finite() {
            continue;
        }
        if *s < min {
            min = *s;
        }
        if *s > max {
            max = *s;
        }
    }

    if !min.is_finite() || !max.is_finite() {
        return scores.iter().map(|_| 0.0).collect();
    }

    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; scores.len()];
    }

    scores
        .iter()
        .map(|score| {
            if score.is_finite() {
                clamp_unit((score - min) / (max - min))
            } else {
                0.0
            }
        })
        .collect()
}

/// Linear blend of the normalized arms: `alpha` weights the vector side.
pub fn hybrid_score(normalized: &Scores, alpha: f32) -> f32 {
    let vector = normalized.vector.unwrap_or(0.0);
    let lexical = normalized.lexical.unwrap_or(0.0);
    clamp_unit(vector.mul_add(alpha, lexical * (1.0 - alpha)))
}

/// Ordering out of the merge: hybrid desc, then raw vector desc, then
/// (source id, ordinal) so a fixed corpus always ranks identically.
pub fn sort_by_hybrid_desc(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.hybrid
            .partial_cmp(&a.hybrid)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.scores
                    .vector
                    .unwrap_or(0.0)
                    .partial_cmp(&a.scores.vector.unwrap_or(0.0))
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.chunk.source_id.cmp(&b.chunk.source_id))
            .then_with(|| a.chunk.ordinal.cmp(&b.chunk.ordinal))
    });
}

/// Same shape for the post-rerank ordering, keyed on `relevance`.
pub fn sort_by_relevance_desc(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.hybrid
                    .partial_cmp(&a.hybrid)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.chunk.source_id.cmp(&b.chunk.source_id))
            .then_with(|| a.chunk.ordinal.cmp(&b.chunk.ordinal))
    });
}
