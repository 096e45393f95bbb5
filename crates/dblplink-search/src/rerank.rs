//! Evidence-based candidate reranking.
//!
//! For every candidate of every span the reranker fetches the candidate's
//! one-hop neighborhood, linearizes it into evidence lines, scores the lines
//! with the evidence scorer and orders the candidates by mean log-probability.
//! Candidates without any evidence are dropped.
//!
//! Spans and candidates are processed one at a time, in input order.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use dblplink_core::defaults::TEXT_MATCH_SCORE;
use dblplink_core::{
    aggregate, sort_by_score, CandidateEntity, CandidateScore, EvidenceRequest, EvidenceScorer,
    LinkingResult, NeighborhoodSource, RankedSpanResult, Result, Span,
};
use dblplink_graph::linearize_neighborhood;

/// Reranks per-span candidate lists by neighborhood evidence.
pub struct SpanReranker {
    neighborhoods: Arc<dyn NeighborhoodSource>,
    scorer: Arc<dyn EvidenceScorer>,
}

impl SpanReranker {
    pub fn new(neighborhoods: Arc<dyn NeighborhoodSource>, scorer: Arc<dyn EvidenceScorer>) -> Self {
        Self {
            neighborhoods,
            scorer,
        }
    }

    /// Rank `candidates[i]` for `spans[i]` and assemble the linking result.
    ///
    /// With `text_match_only` set, nothing is fetched or scored: candidates
    /// keep their input order with score -1.0 and no evidence. Spans without
    /// a candidate list are reported with an empty result.
    #[instrument(skip_all, fields(subsystem = "search", component = "reranker", op = "rerank", span_count = spans.len(), text_match_only = text_match_only))]
    pub async fn rerank(
        &self,
        question: &str,
        spans: &[Span],
        candidates: &[Vec<CandidateEntity>],
        text_match_only: bool,
    ) -> Result<LinkingResult> {
        if candidates.len() > spans.len() {
            warn!(
                span_count = spans.len(),
                list_count = candidates.len(),
                "Ignoring candidate lists without a span"
            );
        }

        let mut ranked_results = Vec::with_capacity(spans.len());
        for (index, span) in spans.iter().enumerate() {
            let span_candidates = candidates.get(index).map(Vec::as_slice).unwrap_or(&[]);
            let scored = if text_match_only {
                text_match(span_candidates)
            } else {
                self.rank_span(question, span, span_candidates).await?
            };
            ranked_results.push(RankedSpanResult::new(span, scored));
        }

        Ok(LinkingResult {
            ranked_results,
            predicted_spans: spans.iter().map(Span::predicted_label).collect(),
            question: question.to_string(),
        })
    }

    async fn rank_span(
        &self,
        question: &str,
        span: &Span,
        candidates: &[CandidateEntity],
    ) -> Result<Vec<CandidateScore>> {
        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if let Some(score) = self.score_candidate(question, span, candidate).await? {
                scored.push(score);
            }
        }
        sort_by_score(&mut scored);
        debug!(
            span_label = %span.label,
            candidate_count = candidates.len(),
            result_count = scored.len(),
            "Span ranked"
        );
        Ok(scored)
    }

    async fn score_candidate(
        &self,
        question: &str,
        span: &Span,
        candidate: &CandidateEntity,
    ) -> Result<Option<CandidateScore>> {
        let start = Instant::now();
        let neighborhood = self.neighborhoods.fetch(&candidate.uri).await?;
        let lines = linearize_neighborhood(&neighborhood);
        debug!(
            entity_uri = %candidate.uri,
            row_count = neighborhood.row_count(),
            line_count = lines.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Neighborhood linearized"
        );

        if lines.is_empty() {
            info!(entity_uri = %candidate.uri, "No neighborhood found, dropping candidate");
            return Ok(None);
        }

        let start = Instant::now();
        let scores = self
            .scorer
            .score_lines(EvidenceRequest {
                mention: &span.label,
                context: question,
                candidate_name: &candidate.uri,
                lines: &lines,
            })
            .await?;
        let result = aggregate(candidate, &scores);
        debug!(
            entity_uri = %candidate.uri,
            score = result.as_ref().map(|r| r.score),
            duration_ms = start.elapsed().as_millis() as u64,
            "Candidate scored"
        );
        Ok(result)
    }
}

fn text_match(candidates: &[CandidateEntity]) -> Vec<CandidateScore> {
    candidates
        .iter()
        .map(|candidate| CandidateScore::new(candidate, TEXT_MATCH_SCORE, ""))
        .collect()
}
