//! Core traits for dblplink abstractions.
//!
//! These traits define the seams between the reranking engine and its
//! collaborators (graph endpoint, scoring model, span detector, candidate
//! index), enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;
use crate::tokenizer::TokenBatch;

// =============================================================================
// GRAPH TRAITS
// =============================================================================

/// Source of one-hop graph neighborhoods.
#[async_trait]
pub trait NeighborhoodSource: Send + Sync {
    /// Fetch the outgoing and incoming edges of `entity_uri`.
    ///
    /// Transport and decoding failures are returned as errors; implementations
    /// do not retry.
    async fn fetch(&self, entity_uri: &str) -> Result<Neighborhood>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend running a causal language model forward pass.
#[async_trait]
pub trait LogitsBackend: Send + Sync {
    /// Return the full-vocabulary logits at `positions[i]` of sequence `i`.
    ///
    /// The result has one vector per sequence in the batch.
    async fn next_token_logits(
        &self,
        batch: &TokenBatch,
        positions: &[usize],
    ) -> Result<Vec<Vec<f32>>>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Inputs for scoring one candidate's evidence lines.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceRequest<'a> {
    /// Mention text as it appears in the question.
    pub mention: &'a str,
    /// Full question text the mention was taken from.
    pub context: &'a str,
    /// Name under which the candidate is presented to the model.
    pub candidate_name: &'a str,
    /// Linearized neighborhood lines, in fetch order.
    pub lines: &'a [String],
}

/// Scores how strongly each evidence line supports a mention–entity link.
#[async_trait]
pub trait EvidenceScorer: Send + Sync {
    /// Return one log-probability per line, in the order of `request.lines`.
    async fn score_lines(&self, request: EvidenceRequest<'_>) -> Result<Vec<EvidenceScore>>;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// PIPELINE COLLABORATOR TRAITS
// =============================================================================

/// Extracts typed mentions from question text.
#[async_trait]
pub trait SpanDetector: Send + Sync {
    async fn detect_spans(&self, text: &str) -> Result<Vec<Span>>;
}

/// Proposes candidate entities for each span.
#[async_trait]
pub trait CandidateRetriever: Send + Sync {
    /// Return one candidate list per span, in span order.
    async fn retrieve(&self, text: &str, spans: &[Span]) -> Result<Vec<Vec<CandidateEntity>>>;
}
