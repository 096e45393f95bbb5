//! # dblplink-inference
//!
//! Language model backends for dblplink.
//!
//! This crate provides:
//! - The yes-probability evidence scorer used to rerank candidates
//! - A HuggingFace tokenizer adapter with explicit truncation and padding
//! - An in-process Qwen2 logits backend on candle (feature `candle`)
//! - The evidence prompt template
//! - Ollama chat generation and the LLM span detector
//! - Deterministic mock backends (feature `mock`)
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama generation backend
//! - `candle`: Enable the in-process scoring model
//! - `cuda`: Run the scoring model on a CUDA device when one is present
//! - `mock`: Enable mock tokenizer, logits, scorer, and generation backends
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "candle")]
//! # fn main() -> dblplink_core::Result<()> {
//! use std::sync::Arc;
//! use dblplink_inference::{CandleLogitsBackend, HfTokenizer, ModelFiles, ScorerConfig, YesScorer};
//!
//! let config = ScorerConfig::from_env();
//! let files = ModelFiles::resolve(&config)?;
//! let tokenizer = Arc::new(HfTokenizer::from_file(&files.tokenizer, &config.pad_token)?);
//! let backend = Arc::new(CandleLogitsBackend::from_config(&config, &files)?);
//! let scorer = YesScorer::new(tokenizer, backend, config.max_tokens)?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "candle"))]
//! # fn main() {}
//! ```

pub mod config;
pub mod prompt;
pub mod scorer;
pub mod spans;
pub mod tokenizer;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "candle")]
pub mod candle;

// Mock backends for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use dblplink_core::*;

pub use config::ScorerConfig;
pub use prompt::{evidence_prompt, SPAN_SYSTEM_PROMPT};
pub use scorer::{log_softmax_at, YesScorer};
pub use spans::{extract_spans, span_prompt, LlmSpanDetector};
pub use tokenizer::HfTokenizer;

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

#[cfg(feature = "candle")]
pub use candle::{CandleLogitsBackend, ModelFiles};
