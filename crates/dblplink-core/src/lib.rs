//! # dblplink-core
//!
//! Core types, traits, and abstractions for the dblplink entity linker.
//!
//! This crate provides the shared data model (spans, candidates, linking
//! results), the collaborator traits that the reranking engine is built on,
//! and the candidate aggregation step that turns per-line evidence scores
//! into a single candidate score.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod scoring;
pub mod tokenizer;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use scoring::{aggregate, sort_by_score, summarize, EvidenceSummary};
pub use tokenizer::*;
pub use traits::*;
