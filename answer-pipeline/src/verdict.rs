use common::storage::types::answer::{
    AnswerStyle, Claim, OverallVerdict, Verdict, VerificationSummary,
};

/// The one place the score thresholds live; the verdict table and the
/// summary rules are pure so they can be property-tested on their own.
pub const SUPPORT_HI: f32 = 0.6;
pub const CONTRADICTION_HI: f32 = 0.6;
pub const SUPPORT_LO: f32 = 0.3;

pub fn derive_verdict(support_score: f32, contradiction_score: f32) -> Verdict {
    let support = support_score.clamp(0.0, 1.0);
    let contradiction = contradiction_score.clamp(0.0, 1.0);

    if support >= SUPPORT_HI && contradiction >= CONTRADICTION_HI {
        Verdict::Conflicting
    } else if support >= SUPPORT_HI {
        Verdict::Supports
    } else if contradiction >= CONTRADICTION_HI {
        Verdict::Contradicted
    } else if support >= SUPPORT_LO {
        Verdict::WeakSupport
    } else {
        Verdict::Unsupported
    }
}

/// Counts per verdict plus the derived overall verdict and answer style.
/// `base_style` is what the synthesizer decided; contradictions override it.
pub fn summarize(claims: &[Claim], base_style: AnswerStyle) -> VerificationSummary {
    let mut summary = VerificationSummary {
        supported_count: 0,
        weak_support_count: 0,
        unsupported_count: 0,
        contradicted_count: 0,
        conflicting_count: 0,
        has_contradictions: false,
        overall_verdict: OverallVerdict::Unknown,
        answer_style: base_style,
    };

    for claim in claims {
        match claim.verdict {
            Verdict::Supports => summary.supported_count += 1,
            Verdict::WeakSupport => summary.weak_support_count += 1,
            Verdict::Unsupported => summary.unsupported_count += 1,
            Verdict::Contradicted => summary.contradicted_count += 1,
            Verdict::Conflicting => summary.conflicting_count += 1,
        }
    }

    summary.has_contradictions =
        summary.contradicted_count + summary.conflicting_count > 0;

    let n = claims.len();
    let majority = n.div_ceil(2);
    summary.overall_verdict = if n == 0 {
        OverallVerdict::Unknown
    } else if summary.has_contradictions {
        OverallVerdict::Contradicted
    } else if summary.supported_count >= majority {
        OverallVerdict::Supported
    } else if summary.supported_count + summary.weak_support_count >= majority {
        OverallVerdict::WeaklySupported
    } else {
        OverallVerdict::Unsupported
    };

    if summary.has_contradictions {
        summary.answer_style = AnswerStyle::Contradictions;
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::answer::Verdict;

    fn claim(verdict: Verdict) -> Claim {
        Claim {
            text: "claim".into(),
            verdict,
            support_score: 0.0,
            contradiction_score: 0.0,
            evidence: Vec::new(),
        }
    }

    #[test]
    fn verdict_table_matches_the_thresholds() {
        assert_eq!(derive_verdict(0.9, 0.1), Verdict::Supports);
        assert_eq!(derive_verdict(0.6, 0.59), Verdict::Supports);
        assert_eq!(derive_verdict(0.45, 0.2), Verdict::WeakSupport);
        assert_eq!(derive_verdict(0.3, 0.0), Verdict::WeakSupport);
        assert_eq!(derive_verdict(0.1, 0.9), Verdict::Contradicted);
        assert_eq!(derive_verdict(0.59, 0.6), Verdict::Contradicted);
        assert_eq!(derive_verdict(0.8, 0.8), Verdict::Conflicting);
        assert_eq!(derive_verdict(0.29, 0.59), Verdict::Unsupported);
        assert_eq!(derive_verdict(0.0, 0.0), Verdict::Unsupported);
    }

    #[test]
    fn scores_outside_the_unit_interval_are_clamped() {
        assert_eq!(derive_verdict(7.0, -2.0), Verdict::Supports);
        assert_eq!(derive_verdict(-1.0, 3.0), Verdict::Contradicted);
    }

    #[test]
    fn summary_counts_add_up_to_the_claim_count() {
        let claims = vec![
            claim(Verdict::Supports),
            claim(Verdict::WeakSupport),
            claim(Verdict::Unsupported),
            claim(Verdict::Contradicted),
            claim(Verdict::Conflicting),
        ];
        let summary = summarize(&claims, AnswerStyle::Direct);

        let total = summary.supported_count
            + summary.weak_support_count
            + summary.unsupported_count
            + summary.contradicted_count
            + summary.conflicting_count;
        assert_eq!(total, claims.len());
        assert!(summary.has_contradictions);
        assert_eq!(summary.overall_verdict, OverallVerdict::Contradicted);
        assert_eq!(summary.answer_style, AnswerStyle::Contradictions);
    }

    #[test]
    fn majority_support_is_supported() {
        let claims = vec![
            claim(Verdict::Supports),
            claim(Verdict::Supports),
            claim(Verdict::Unsupported),
        ];
        let summary = summarize(&claims, AnswerStyle::Direct);
        assert_eq!(summary.overall_verdict, OverallVerdict::Supported);
        assert_eq!(summary.answer_style, AnswerStyle::Direct);
        assert!(!summary.has_contradictions);
    }

    #[test]
    fn weak_majority_is_weakly_supported() {
        let claims = vec![
            claim(Verdict::Supports),
            claim(Verdict::WeakSupport),
            claim(Verdict::Unsupported),
            claim(Verdict::Unsupported),
        ];
        let summary = summarize(&claims, AnswerStyle::Direct);
        assert_eq!(summary.overall_verdict, OverallVerdict::WeaklySupported);
    }

    #[test]
    fn no_majority_is_unsupported() {
        let claims = vec![
            claim(Verdict::WeakSupport),
            claim(Verdict::Unsupported),
            claim(Verdict::Unsupported),
        ];
        let summary = summarize(&claims, AnswerStyle::Direct);
        assert_eq!(summary.overall_verdict, OverallVerdict::Unsupported);
    }

    #[test]
    fn empty_claims_summarize_to_unknown() {
        let summary = summarize(&[], AnswerStyle::Direct);
        assert_eq!(summary.overall_verdict, OverallVerdict::Unknown);
        assert!(!summary.has_contradictions);
    }
}
