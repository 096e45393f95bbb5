//! # dblplink-search
//!
//! Candidate retrieval and evidence reranking for dblplink.
//!
//! This crate provides:
//! - An Elasticsearch candidate retriever with per-type class filters
//! - The span reranker that scores candidates by graph neighborhood evidence
//! - Entity linking metrics (F1, MRR, Hits@k) used by the evaluation runner
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dblplink_search::SpanReranker;
//!
//! let reranker = SpanReranker::new(Arc::new(fetcher), Arc::new(scorer));
//! let result = reranker
//!     .rerank(question, &spans, &candidates, false)
//!     .await?;
//! println!("{}", serde_json::to_string(&result)?);
//! ```

pub mod candidates;
pub mod metrics;
pub mod rerank;

// Re-export core types
pub use dblplink_core::*;

pub use candidates::{candidate_query, type_filter, ElasticCandidateRetriever, ElasticConfig};
pub use metrics::{
    extract_candidate_lists, extract_top_uris, f1, hits_at_k, mrr, MetricsSummary,
    QuestionMetrics,
};
pub use rerank::SpanReranker;
