//! Yes-token evidence scorer.
//!
//! For each evidence line a yes/no prompt is built and the whole batch is
//! run through the scoring model in one forward pass. The score of a line is
//! the log-probability of the affirmative token as the next token after the
//! prompt, read at the last real (unpadded) position of that prompt.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, instrument, trace, warn};

use dblplink_core::defaults::AFFIRMATIVE_TOKEN;
use dblplink_core::{
    summarize, Error, EvidenceRequest, EvidenceScore, EvidenceScorer, EvidenceSummary,
    LogitsBackend, Result, Tokenizer,
};

use crate::prompt::evidence_prompt;

/// Log-softmax of `logits` evaluated at `index`.
///
/// Computed in f64 with the max-shift so large logits do not overflow.
/// Returns `None` when `index` is out of range or the row is empty.
pub fn log_softmax_at(logits: &[f32], index: usize) -> Option<f64> {
    let target = f64::from(*logits.get(index)?);
    let max = logits
        .iter()
        .map(|&v| f64::from(v))
        .fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = logits.iter().map(|&v| (f64::from(v) - max).exp()).sum();
    Some(target - max - sum.ln())
}

/// Scores evidence lines by the model's probability of answering "yes".
pub struct YesScorer {
    tokenizer: Arc<dyn Tokenizer>,
    backend: Arc<dyn LogitsBackend>,
    max_tokens: usize,
    yes_token_id: u32,
}

impl YesScorer {
    /// Create a scorer, resolving the affirmative token id once up front.
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        backend: Arc<dyn LogitsBackend>,
        max_tokens: usize,
    ) -> Result<Self> {
        if max_tokens == 0 {
            return Err(Error::Config("max_tokens must be positive".to_string()));
        }
        let yes_token_id = tokenizer.token_id(AFFIRMATIVE_TOKEN)?;
        debug!(
            tokenizer = tokenizer.name(),
            model = backend.model_name(),
            yes_token_id,
            max_tokens,
            "Evidence scorer ready"
        );
        Ok(Self {
            tokenizer,
            backend,
            max_tokens,
            yes_token_id,
        })
    }

    pub fn yes_token_id(&self) -> u32 {
        self.yes_token_id
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Score the lines and reduce them to a mean log-probability and the
    /// best-supported line. `None` when there are no lines.
    pub async fn score_batch(
        &self,
        request: EvidenceRequest<'_>,
    ) -> Result<Option<EvidenceSummary>> {
        let scores = self.score_lines(request).await?;
        Ok(summarize(&scores))
    }
}

#[async_trait]
impl EvidenceScorer for YesScorer {
    #[instrument(skip(self, request), fields(subsystem = "inference", component = "yes_scorer", op = "score_lines", line_count = request.lines.len()))]
    async fn score_lines(&self, request: EvidenceRequest<'_>) -> Result<Vec<EvidenceScore>> {
        if request.lines.is_empty() {
            return Ok(vec![]);
        }

        let start = Instant::now();
        let prompts: Vec<String> = request
            .lines
            .iter()
            .map(|line| {
                evidence_prompt(
                    request.mention,
                    request.context,
                    request.candidate_name,
                    line,
                )
            })
            .collect();

        let batch = self.tokenizer.encode_batch(&prompts, self.max_tokens)?;
        if batch.len() != prompts.len() {
            return Err(Error::Inference(format!(
                "Tokenizer returned {} sequences for {} prompts",
                batch.len(),
                prompts.len()
            )));
        }
        let positions = batch.last_token_positions();
        let logits = self.backend.next_token_logits(&batch, &positions).await?;
        if logits.len() != prompts.len() {
            return Err(Error::Inference(format!(
                "Backend returned {} logit rows for {} prompts",
                logits.len(),
                prompts.len()
            )));
        }

        let yes = self.yes_token_id as usize;
        let mut scores = Vec::with_capacity(prompts.len());
        for (line, row) in request.lines.iter().zip(&logits) {
            if let Some(index) = row.iter().position(|v| !v.is_finite()) {
                return Err(Error::Inference(format!(
                    "Backend returned non-finite logit {} at token id {}",
                    row[index], index
                )));
            }
            let log_probability = log_softmax_at(row, yes).ok_or_else(|| {
                Error::Inference(format!(
                    "Affirmative token id {} outside vocabulary of {}",
                    yes,
                    row.len()
                ))
            })?;
            if !log_probability.is_finite() || log_probability > 0.0 {
                return Err(Error::Inference(format!(
                    "Log-probability {} out of range for line '{}'",
                    log_probability, line
                )));
            }
            trace!(score = log_probability, line = %line, "Scored evidence line");
            scores.push(EvidenceScore::new(log_probability, line.clone()));
        }

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            line_count = scores.len(),
            padded_len = batch.padded_len(),
            duration_ms = elapsed,
            "Evidence scoring complete"
        );
        if elapsed > 10000 {
            warn!(
                duration_ms = elapsed,
                line_count = scores.len(),
                slow = true,
                "Slow evidence scoring"
            );
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLogitsBackend, MockTokenizer, MOCK_YES_ID};

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn request<'a>(lines: &'a [String]) -> EvidenceRequest<'a> {
        EvidenceRequest {
            mention: "Biemann",
            context: "which papers in neurips was authored by Biemann?",
            candidate_name: "https://dblp.org/pid/20/6100",
            lines,
        }
    }

    #[test]
    fn test_log_softmax_uniform() {
        let value = log_softmax_at(&[0.0, 0.0, 0.0, 0.0], 2).unwrap();
        assert!(approx_eq(value, -(4.0f64).ln()));
    }

    #[test]
    fn test_log_softmax_large_logits_stable() {
        let value = log_softmax_at(&[1000.0, 1000.0], 0).unwrap();
        assert!(approx_eq(value, -(2.0f64).ln()));
    }

    #[test]
    fn test_log_softmax_out_of_range() {
        assert_eq!(log_softmax_at(&[0.0, 1.0], 2), None);
        assert_eq!(log_softmax_at(&[], 0), None);
    }

    #[test]
    fn test_log_softmax_is_non_positive() {
        let row = [3.5, -1.0, 0.25, 7.0];
        for i in 0..row.len() {
            assert!(log_softmax_at(&row, i).unwrap() <= 0.0);
        }
    }

    #[test]
    fn test_new_resolves_yes_token() {
        let scorer = YesScorer::new(
            Arc::new(MockTokenizer::new()),
            Arc::new(MockLogitsBackend::new(MOCK_YES_ID as usize + 1)),
            128,
        )
        .unwrap();
        assert_eq!(scorer.yes_token_id(), MOCK_YES_ID);
    }

    #[test]
    fn test_new_rejects_zero_budget() {
        let result = YesScorer::new(
            Arc::new(MockTokenizer::new()),
            Arc::new(MockLogitsBackend::new(8)),
            0,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_lines_skip_backend() {
        let backend = Arc::new(MockLogitsBackend::new(8));
        let scorer = YesScorer::new(Arc::new(MockTokenizer::new()), backend.clone(), 128).unwrap();

        let scores = scorer.score_lines(request(&[])).await.unwrap();
        assert!(scores.is_empty());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reads_last_real_position_under_padding() {
        let backend = Arc::new(MockLogitsBackend::new(8));
        let tokenizer = Arc::new(MockTokenizer::new());
        let scorer = YesScorer::new(tokenizer, backend.clone(), 128).unwrap();

        let lines = vec![
            "a — b — c".to_string(),
            "a much longer evidence line — with — many more words in it".to_string(),
        ];
        scorer.score_lines(request(&lines)).await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        let (batch, positions) = &calls[0];
        let lengths = batch.sequence_lengths();
        assert!(lengths[0] < lengths[1]);
        assert_eq!(positions, &vec![lengths[0] - 1, lengths[1] - 1]);
        // The shorter prompt is padded: its read position is not the last column.
        assert!(positions[0] < batch.padded_len() - 1);
    }

    #[tokio::test]
    async fn test_prompts_truncated_to_budget() {
        let backend = Arc::new(MockLogitsBackend::new(8));
        let scorer = YesScorer::new(Arc::new(MockTokenizer::new()), backend.clone(), 16).unwrap();

        let lines = vec!["word ".repeat(200)];
        scorer.score_lines(request(&lines)).await.unwrap();

        let (batch, positions) = &backend.calls()[0];
        assert_eq!(batch.padded_len(), 16);
        assert_eq!(positions, &vec![15]);
    }

    #[tokio::test]
    async fn test_scores_are_yes_log_probabilities() {
        let vocab = MOCK_YES_ID as usize + 1;
        let mut favourable = vec![0.0f32; vocab];
        favourable[MOCK_YES_ID as usize] = 5.0;
        let neutral = vec![0.0f32; vocab];

        let backend = Arc::new(
            MockLogitsBackend::new(vocab).with_logits(vec![favourable.clone(), neutral.clone()]),
        );
        let scorer = YesScorer::new(Arc::new(MockTokenizer::new()), backend, 128).unwrap();

        let lines = vec!["first line".to_string(), "second line".to_string()];
        let scores = scorer.score_lines(request(&lines)).await.unwrap();

        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].source_line, "first line");
        assert_eq!(scores[1].source_line, "second line");
        assert!(approx_eq(
            scores[0].log_probability,
            log_softmax_at(&favourable, MOCK_YES_ID as usize).unwrap()
        ));
        assert!(approx_eq(scores[1].log_probability, -(vocab as f64).ln()));
        assert!(scores[0].log_probability > scores[1].log_probability);
    }

    #[tokio::test]
    async fn test_vocabulary_too_small_is_error() {
        let backend = Arc::new(MockLogitsBackend::new(4));
        let scorer = YesScorer::new(Arc::new(MockTokenizer::new()), backend, 128).unwrap();

        let lines = vec!["line".to_string()];
        let err = scorer.score_lines(request(&lines)).await.unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[tokio::test]
    async fn test_non_finite_logits_rejected() {
        let vocab = MOCK_YES_ID as usize + 1;
        for bad in [f32::INFINITY, f32::NEG_INFINITY, f32::NAN] {
            let mut row = vec![0.0f32; vocab];
            row[0] = bad;
            let backend = Arc::new(MockLogitsBackend::new(vocab).with_logits(vec![row]));
            let scorer = YesScorer::new(Arc::new(MockTokenizer::new()), backend, 128).unwrap();

            let lines = vec!["line".to_string()];
            let err = scorer.score_lines(request(&lines)).await.unwrap_err();
            assert!(
                matches!(err, Error::Inference(ref msg) if msg.contains("non-finite")),
                "{bad} should be rejected, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_overflowing_logits_never_yield_nan() {
        // A logit beyond the f32 range decodes to infinity.
        let decoded: Vec<f32> = serde_json::from_str("[1e39, 0, 0, 0, 0, 0, 0, 0]").unwrap();
        let backend = Arc::new(MockLogitsBackend::new(decoded.len()).with_logits(vec![decoded]));
        let scorer = YesScorer::new(Arc::new(MockTokenizer::new()), backend, 128).unwrap();

        let lines = vec!["line".to_string()];
        assert!(matches!(
            scorer.score_lines(request(&lines)).await,
            Err(Error::Inference(_))
        ));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let backend = Arc::new(MockLogitsBackend::new(8).with_failure("scoring model down"));
        let scorer = YesScorer::new(Arc::new(MockTokenizer::new()), backend, 128).unwrap();

        let lines = vec!["line".to_string()];
        let err = scorer.score_lines(request(&lines)).await.unwrap_err();
        assert!(matches!(err, Error::Inference(ref msg) if msg.contains("down")));
    }

    #[tokio::test]
    async fn test_score_batch_summarizes() {
        let vocab = MOCK_YES_ID as usize + 1;
        let mut low = vec![0.0f32; vocab];
        low[MOCK_YES_ID as usize] = -2.0;
        let mut high = vec![0.0f32; vocab];
        high[MOCK_YES_ID as usize] = 2.0;

        let backend = Arc::new(MockLogitsBackend::new(vocab).with_logits(vec![low.clone(), high.clone()]));
        let scorer = YesScorer::new(Arc::new(MockTokenizer::new()), backend, 128).unwrap();

        let lines = vec!["low".to_string(), "high".to_string()];
        let summary = scorer.score_batch(request(&lines)).await.unwrap().unwrap();
        let expected = (log_softmax_at(&low, MOCK_YES_ID as usize).unwrap()
            + log_softmax_at(&high, MOCK_YES_ID as usize).unwrap())
            / 2.0;
        assert!(approx_eq(summary.mean_log_probability, expected));
        assert_eq!(summary.best_line, "high");

        assert!(scorer.score_batch(request(&[])).await.unwrap().is_none());
    }
}
