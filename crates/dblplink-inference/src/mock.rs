//! Mock inference backends for deterministic testing.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use dblplink_inference::mock::{MockLogitsBackend, MockTokenizer, MOCK_YES_ID};
//! use dblplink_inference::YesScorer;
//!
//! let scorer = YesScorer::new(
//!     Arc::new(MockTokenizer::new()),
//!     Arc::new(MockLogitsBackend::new(MOCK_YES_ID as usize + 1)),
//!     128,
//! )
//! .unwrap();
//! assert_eq!(scorer.yes_token_id(), MOCK_YES_ID);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use dblplink_core::defaults::AFFIRMATIVE_TOKEN;
use dblplink_core::{
    Error, EvidenceRequest, EvidenceScore, EvidenceScorer, GenerationBackend, LogitsBackend,
    Result, TokenBatch, Tokenizer,
};

/// Token id the mock tokenizer assigns to the affirmative token.
pub const MOCK_YES_ID: u32 = 7;

/// Token id used for padding by the mock tokenizer.
pub const MOCK_PAD_ID: u32 = 0;

// =============================================================================
// TOKENIZER
// =============================================================================

/// Whitespace tokenizer with stable hashed ids.
///
/// Each whitespace-separated word is one token. Ids are FNV-1a hashes folded
/// into `[16, 65536)`, except the affirmative token which maps to
/// [`MOCK_YES_ID`].
#[derive(Debug, Clone, Default)]
pub struct MockTokenizer;

impl MockTokenizer {
    pub fn new() -> Self {
        Self
    }

    fn word_id(word: &str) -> u32 {
        if word == AFFIRMATIVE_TOKEN {
            return MOCK_YES_ID;
        }
        let mut hash: u32 = 0x811c_9dc5;
        for byte in word.bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        16 + hash % (65536 - 16)
    }
}

impl Tokenizer for MockTokenizer {
    fn encode_batch(&self, texts: &[String], max_length: usize) -> Result<TokenBatch> {
        let sequences = texts
            .iter()
            .map(|text| {
                text.split_whitespace()
                    .take(max_length)
                    .map(Self::word_id)
                    .collect()
            })
            .collect();
        Ok(TokenBatch::from_sequences(sequences, MOCK_PAD_ID))
    }

    fn token_id(&self, text: &str) -> Result<u32> {
        text.split_whitespace()
            .next()
            .map(Self::word_id)
            .ok_or_else(|| Error::Inference(format!("'{}' encodes to no tokens", text)))
    }

    fn name(&self) -> &str {
        "mock-whitespace"
    }
}

// =============================================================================
// LOGITS
// =============================================================================

/// Logits backend returning scripted rows.
///
/// Each call pops one scripted response (a row per sequence); when the
/// script is exhausted, every sequence gets a row of zeros. Each call's
/// batch and positions are recorded.
#[derive(Clone)]
pub struct MockLogitsBackend {
    vocab_size: usize,
    script: Arc<Mutex<VecDeque<Vec<Vec<f32>>>>>,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<(TokenBatch, Vec<usize>)>>>,
}

impl MockLogitsBackend {
    pub fn new(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            script: Arc::new(Mutex::new(VecDeque::new())),
            failure: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue the rows returned by the next unanswered call.
    pub fn with_logits(self, rows: Vec<Vec<f32>>) -> Self {
        self.script.lock().unwrap().push_back(rows);
        self
    }

    /// Fail every call with an inference error.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Batches and positions received so far, in call order.
    pub fn calls(&self) -> Vec<(TokenBatch, Vec<usize>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LogitsBackend for MockLogitsBackend {
    async fn next_token_logits(
        &self,
        batch: &TokenBatch,
        positions: &[usize],
    ) -> Result<Vec<Vec<f32>>> {
        self.calls
            .lock()
            .unwrap()
            .push((batch.clone(), positions.to_vec()));

        if let Some(message) = &self.failure {
            return Err(Error::Inference(message.clone()));
        }

        let scripted = self.script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| vec![vec![0.0; self.vocab_size]; batch.len()]))
    }

    fn model_name(&self) -> &str {
        "mock-logits"
    }
}

// =============================================================================
// EVIDENCE SCORER
// =============================================================================

/// Evidence scorer with a fixed line-to-score table.
///
/// Lines not in the table score `default_score`. Each request's candidate
/// name is logged.
#[derive(Clone)]
pub struct MockEvidenceScorer {
    line_scores: HashMap<String, f64>,
    default_score: f64,
    failure: Option<String>,
    call_log: Arc<Mutex<Vec<String>>>,
}

impl Default for MockEvidenceScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEvidenceScorer {
    pub fn new() -> Self {
        Self {
            line_scores: HashMap::new(),
            default_score: -1.0,
            failure: None,
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Score `line` as `log_probability`.
    pub fn with_line_score(mut self, line: impl Into<String>, log_probability: f64) -> Self {
        self.line_scores.insert(line.into(), log_probability);
        self
    }

    /// Score for lines without an explicit entry.
    pub fn with_default_score(mut self, log_probability: f64) -> Self {
        self.default_score = log_probability;
        self
    }

    /// Fail every call with an inference error.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Candidate names scored so far, in call order.
    pub fn scored_candidates(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }
}

#[async_trait]
impl EvidenceScorer for MockEvidenceScorer {
    async fn score_lines(&self, request: EvidenceRequest<'_>) -> Result<Vec<EvidenceScore>> {
        self.call_log
            .lock()
            .unwrap()
            .push(request.candidate_name.to_string());

        if let Some(message) = &self.failure {
            return Err(Error::Inference(message.clone()));
        }

        Ok(request
            .lines
            .iter()
            .map(|line| {
                let score = self
                    .line_scores
                    .get(line)
                    .copied()
                    .unwrap_or(self.default_score);
                EvidenceScore::new(score, line.clone())
            })
            .collect())
    }
}

// =============================================================================
// GENERATION
// =============================================================================

/// Generation backend returning a fixed response and logging prompts.
#[derive(Clone)]
pub struct MockGenerationBackend {
    response: String,
    failure: Option<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockGenerationBackend {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            failure: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail every call with an inference error.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.failure {
            Some(message) => Err(Error::Inference(message.clone())),
            None => Ok(self.response.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "mock-generation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizer_is_deterministic() {
        let tokenizer = MockTokenizer::new();
        let texts = vec!["alpha beta".to_string(), "alpha".to_string()];
        let a = tokenizer.encode_batch(&texts, 128).unwrap();
        let b = tokenizer.encode_batch(&texts, 128).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.input_ids[0][0], a.input_ids[1][0]);
        assert_eq!(a.input_ids[1][1], MOCK_PAD_ID);
    }

    #[test]
    fn test_tokenizer_truncates() {
        let tokenizer = MockTokenizer::new();
        let batch = tokenizer
            .encode_batch(&["a b c d e".to_string()], 3)
            .unwrap();
        assert_eq!(batch.sequence_lengths(), vec![3]);
    }

    #[test]
    fn test_yes_token_id() {
        assert_eq!(MockTokenizer::new().token_id("yes").unwrap(), MOCK_YES_ID);
        assert!(MockTokenizer::new().token_id("   ").is_err());
    }

    #[tokio::test]
    async fn test_logits_script_then_zeros() {
        let backend = MockLogitsBackend::new(3).with_logits(vec![vec![1.0, 2.0, 3.0]]);
        let batch = TokenBatch::from_sequences(vec![vec![20]], MOCK_PAD_ID);

        let first = backend.next_token_logits(&batch, &[0]).await.unwrap();
        let second = backend.next_token_logits(&batch, &[0]).await.unwrap();
        assert_eq!(first, vec![vec![1.0, 2.0, 3.0]]);
        assert_eq!(second, vec![vec![0.0, 0.0, 0.0]]);
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_evidence_scorer_table() {
        let scorer = MockEvidenceScorer::new()
            .with_line_score("good", -0.1)
            .with_default_score(-3.0);
        let lines = vec!["good".to_string(), "other".to_string()];
        let scores = scorer
            .score_lines(EvidenceRequest {
                mention: "m",
                context: "c",
                candidate_name: "https://dblp.org/pid/1",
                lines: &lines,
            })
            .await
            .unwrap();
        assert_eq!(scores[0].log_probability, -0.1);
        assert_eq!(scores[1].log_probability, -3.0);
        assert_eq!(scorer.scored_candidates(), vec!["https://dblp.org/pid/1"]);
    }

    #[tokio::test]
    async fn test_generation_logs_prompt() {
        let backend = MockGenerationBackend::new("[]");
        assert_eq!(backend.generate("hello").await.unwrap(), "[]");
        assert_eq!(backend.prompts(), vec!["hello"]);
    }
}
