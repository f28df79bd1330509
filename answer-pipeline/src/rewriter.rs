use common::storage::types::answer::{Claim, Evidence, EvidenceRelation, Verdict};

/// Exact prefix the rewritten answer starts with; clients and tests match on
/// it literally.
pub const CONTRADICTIONS_PREFIX: &str = "Contradictions detected in the source material.";

/// Rewrite a contradicted answer into the sectioned form: the literal
/// prefix, then Supported / Conflicts / Unsupported lists (each omitted when
/// empty), each claim paired with its most salient evidence snippet.
pub fn rewrite_contradicted_answer(claims: &[Claim]) -> String {
    let supported: Vec<&Claim> = claims
        .iter()
        .filter(|c| matches!(c.verdict, Verdict::Supports | Verdict::WeakSupport))
        .collect();
    let conflicts: Vec<&Claim> = claims
        .iter()
        .filter(|c| matches!(c.verdict, Verdict::Contradicted | Verdict::Conflicting))
        .collect();
    let unsupported: Vec<&Claim> = claims
        .iter()
        .filter(|c| matches!(c.verdict, Verdict::Unsupported))
        .collect();

    let mut out = String::from(CONTRADICTIONS_PREFIX);
    out.push('\n');

    push_section(&mut out, "Supported:", &supported);
    push_section(&mut out, "Conflicts:", &conflicts);
    push_section(&mut out, "Unsupported:", &unsupported);

    out.trim_end().to_string()
}

fn push_section(out: &mut String, header: &str, claims: &[&Claim]) {
    if claims.is_empty() {
        return;
    }

    out.push_str(header);
    out.push('\n');
    for claim in claims {
        out.push_str("- ");
        out.push_str(claim.text.trim());
        if let Some(snippet) = salient_snippet(claim) {
            out.push_str(" (evidence: \"");
            out.push_str(snippet.trim());
            out.push_str("\")");
        }
        out.push('\n');
    }
}

/// The evidence entry whose relation matches the claim's verdict category,
/// falling back to the first entry.
fn salient_snippet(claim: &Claim) -> Option<&str> {
    let preferred_relation = match claim.verdict {
        Verdict::Contradicted | Verdict::Conflicting => EvidenceRelation::Contradicts,
        _ => EvidenceRelation::Supports,
    };

    claim
        .evidence
        .iter()
        .find(|e| e.relation == preferred_relation)
        .or_else(|| claim.evidence.first())
        .map(|e: &Evidence| e.snippet.as_str())
        .filter(|snippet| !snippet.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(text: &str, verdict: Verdict, snippet: Option<&str>) -> Claim {
        let evidence = snippet
            .map(|s| {
                vec![Evidence {
                    chunk_id: "c1".into(),
                    relation: match verdict {
                        Verdict::Contradicted | Verdict::Conflicting => {
                            EvidenceRelation::Contradicts
                        }
                        _ => EvidenceRelation::Supports,
                    },
                    snippet: s.to_string(),
                    snippet_start: None,
                    snippet_end: None,
                    highlight_start: None,
                    highlight_end: None,
                    highlight_text: None,
                }]
            })
            .unwrap_or_default();

        Claim {
            text: text.to_string(),
            verdict,
            support_score: 0.0,
            contradiction_score: 0.0,
            evidence,
        }
    }

    #[test]
    fn rewrite_starts_with_the_literal_prefix() {
        let claims = vec![claim("The sky is green.", Verdict::Contradicted, None)];
        let text = rewrite_contradicted_answer(&claims);
        assert!(text.starts_with(&format!("{CONTRADICTIONS_PREFIX}\n")));
    }

    #[test]
    fn sections_appear_in_order_and_only_when_non_empty() {
        let claims = vec![
            claim("Rivers shaped trade.", Verdict::Supports, Some("rivers shaped trade")),
            claim("The canal failed.", Verdict::Contradicted, Some("the canal thrived")),
        ];
        let text = rewrite_contradicted_answer(&claims);

        let supported_at = text.find("Supported:").expect("supported section");
        let conflicts_at = text.find("Conflicts:").expect("conflicts section");
        assert!(supported_at < conflicts_at);
        assert!(!text.contains("Unsupported:"));
        assert!(text.contains("(evidence: \"the canal thrived\")"));
    }

    #[test]
    fn all_three_sections_render_when_populated() {
        let claims = vec![
            claim("A.", Verdict::WeakSupport, None),
            claim("B.", Verdict::Conflicting, None),
            claim("C.", Verdict::Unsupported, None),
        ];
        let text = rewrite_contradicted_answer(&claims);
        let order: Vec<usize> = ["Supported:", "Conflicts:", "Unsupported:"]
            .iter()
            .map(|h| text.find(h).expect("section"))
            .collect();
        assert!(order[0] < order[1] && order[1] < order[2]);
    }
}
