use crate::scoring::Candidate;

/// Maximal marginal relevance selection: repeatedly take the candidate with
/// the best `λ·relevance − (1−λ)·max_sim_to_selected`, trading relevance
/// against redundancy. Ties keep the earlier (higher-ranked) candidate, so
/// the output is deterministic for a fixed input ordering.
pub fn select_diverse(candidates: Vec<Candidate>, k: usize, lambda: f32) -> Vec<Candidate> {
    if candidates.len() <= k {
        return candidates;
    }

    let lambda = lambda.clamp(0.0, 1.0);
    let mut pool: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    let mut selected: Vec<Candidate> = Vec::with_capacity(k);

    while selected.len() < k {
        let mut best_index: Option<usize> = None;
        let mut best_score = f32::MIN;

        for (index, slot) in pool.iter().enumerate() {
            let Some(candidate) = slot else { continue };

            let redundancy = selected
                .iter()
                .map(|chosen| similarity(candidate, chosen))
                .fold(0.0f32, f32::max);

            let score = lambda.mul_add(candidate.relevance, -((1.0 - lambda) * redundancy));
            // Strict comparison: the first (highest-ranked) candidate wins
            // ties.
            if score > best_score {
                best_score = score;
                best_index = Some(index);
            }
        }

        match best_index {
            Some(index) => {
                if let Some(candidate) = pool[index].take() {
                    selected.push(candidate);
                }
            }
            None => break,
        }
    }

    selected
}

/// Top-k by relevance; the path used when diversification is disabled.
pub fn select_top_k(mut candidates: Vec<Candidate>, k: usize) -> Vec<Candidate> {
    candidates.truncate(k);
    candidates
}

/// Cosine over chunk embeddings; candidates without an embedding read as
/// orthogonal (no redundancy signal).
fn similarity(a: &Candidate, b: &Candidate) -> f32 {
    match (&a.embedding, &b.embedding) {
        (Some(va), Some(vb)) => cosine(va, vb),
        _ => 0.0,
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}
