//! Candidate aggregation: per-line evidence scores to one candidate score.
//!
//! The aggregate is the arithmetic mean of the per-line log-probabilities
//! (not a log-sum-exp), and the attributed evidence is the first line
//! holding the maximum log-probability.

use crate::models::{CandidateEntity, CandidateScore, EvidenceScore};

/// Mean log-probability and best-supported line for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceSummary {
    pub mean_log_probability: f64,
    pub best_line: String,
}

/// Summarize scored evidence lines.
///
/// Returns `None` for an empty slice: a mean over zero lines is undefined
/// and the candidate must be excluded rather than scored as 0 or NaN.
pub fn summarize(scores: &[EvidenceScore]) -> Option<EvidenceSummary> {
    let first = scores.first()?;

    let mut best = first;
    let mut total = 0.0_f64;
    for score in scores {
        total += score.log_probability;
        // Strict comparison keeps the earliest line on ties.
        if score.log_probability > best.log_probability {
            best = score;
        }
    }

    Some(EvidenceSummary {
        mean_log_probability: total / scores.len() as f64,
        best_line: best.source_line.clone(),
    })
}

/// Build the scored record for a candidate, or `None` if it has no evidence.
pub fn aggregate(candidate: &CandidateEntity, scores: &[EvidenceScore]) -> Option<CandidateScore> {
    summarize(scores)
        .map(|summary| CandidateScore::new(candidate, summary.mean_log_probability, summary.best_line))
}

/// Sort candidates by score, highest first. Stable: ties keep input order.
pub fn sort_by_score(candidates: &mut [CandidateScore]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn scores(values: &[(f64, &str)]) -> Vec<EvidenceScore> {
        values
            .iter()
            .map(|(lp, line)| EvidenceScore::new(*lp, *line))
            .collect()
    }

    #[test]
    fn test_summarize_mean_and_best() {
        let s = scores(&[(-0.1, "a"), (-0.3, "b"), (-0.2, "c")]);
        let summary = summarize(&s).unwrap();
        assert!(approx_eq(summary.mean_log_probability, -0.2));
        assert_eq!(summary.best_line, "a");
    }

    #[test]
    fn test_summarize_tie_prefers_first() {
        let s = scores(&[(-0.5, "first"), (-0.25, "second"), (-0.25, "third")]);
        assert_eq!(summarize(&s).unwrap().best_line, "second");
    }

    #[test]
    fn test_summarize_empty_is_none() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_mean_of_logs_is_not_log_of_mean() {
        // exp-domain mean would be ln((e^-1 + e^-3) / 2) ≈ -1.566
        let s = scores(&[(-1.0, "x"), (-3.0, "y")]);
        assert!(approx_eq(summarize(&s).unwrap().mean_log_probability, -2.0));
    }

    #[test]
    fn test_aggregate_copies_candidate_fields() {
        let candidate = CandidateEntity::new("https://dblp.org/pid/20/6100", "Chris Biemann", "Person");
        let scored = aggregate(&candidate, &scores(&[(-0.4, "line")])).unwrap();
        assert_eq!(scored.uri, candidate.uri);
        assert_eq!(scored.label, candidate.label);
        assert_eq!(scored.entity_type, candidate.entity_type);
        assert_eq!(scored.evidence_sentence, "line");
        assert!(approx_eq(scored.score, -0.4));
        assert!(aggregate(&candidate, &[]).is_none());
    }

    #[test]
    fn test_sort_by_score_descending_and_stable() {
        let c = |uri: &str| CandidateEntity::new(uri, uri, "Person");
        let mut list = vec![
            CandidateScore::new(&c("a"), -2.0, ""),
            CandidateScore::new(&c("b"), -1.0, ""),
            CandidateScore::new(&c("c"), -2.0, ""),
            CandidateScore::new(&c("d"), -0.5, ""),
        ];
        sort_by_score(&mut list);
        let order: Vec<&str> = list.iter().map(|s| s.uri.as_str()).collect();
        assert_eq!(order, vec!["d", "b", "a", "c"]);
        assert!(list.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_sort_by_score_total_order() {
        let c = |uri: &str| CandidateEntity::new(uri, uri, "Person");
        let mut list = vec![
            CandidateScore::new(&c("a"), -3.0, ""),
            CandidateScore::new(&c("nan"), f64::NAN, ""),
            CandidateScore::new(&c("b"), -1.0, ""),
            CandidateScore::new(&c("low"), f64::NEG_INFINITY, ""),
        ];
        sort_by_score(&mut list);
        let order: Vec<&str> = list.iter().map(|s| s.uri.as_str()).collect();
        assert_eq!(order, vec!["nan", "b", "a", "low"]);
    }
}
