//! Centralized default constants for dblplink.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// GRAPH NEIGHBORHOOD
// =============================================================================

/// Default SPARQL endpoint.
pub const SPARQL_ENDPOINT: &str = "http://localhost:8897/sparql";

/// Maximum rows fetched per direction (outgoing, incoming) for one entity.
pub const NEIGHBORHOOD_ROW_LIMIT: usize = 30;

/// Timeout for SPARQL requests in seconds.
pub const SPARQL_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// SCORING
// =============================================================================

/// Maximum tokens per scoring prompt; longer prompts are truncated.
pub const SCORER_MAX_TOKENS: usize = 128;

/// Literal whose first token id is read as the affirmative answer.
pub const AFFIRMATIVE_TOKEN: &str = "yes";

/// Score assigned to every candidate in text-match-only mode.
pub const TEXT_MATCH_SCORE: f64 = -1.0;

/// Default scoring model (HuggingFace Hub repository id).
pub const SCORER_MODEL: &str = "Qwen/Qwen2.5-3B-Instruct";

/// Hub revision the scoring model is fetched at.
pub const SCORER_REVISION: &str = "main";

/// Weight precision of the scoring model.
pub const SCORER_DTYPE: &str = "f32";

/// Padding token of the default scoring model.
pub const SCORER_PAD_TOKEN: &str = "<|endoftext|>";

// =============================================================================
// SPAN DETECTION
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model for span detection.
pub const GEN_MODEL: &str = "qwen2.5:3b-instruct";

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// CANDIDATE RETRIEVAL
// =============================================================================

/// Default Elasticsearch URL.
pub const ELASTICSEARCH_URL: &str = "http://localhost:9222";

/// Default Elasticsearch index holding DBLP entity labels.
pub const ELASTICSEARCH_INDEX: &str = "dblp";

/// Maximum candidates retrieved per span.
pub const CANDIDATE_LIMIT: usize = 10;

/// Timeout for candidate retrieval requests in seconds.
pub const SEARCH_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 5001;

/// Maximum request body size in bytes.
pub const MAX_BODY_SIZE_BYTES: usize = 1024 * 1024;

// =============================================================================
// EVALUATION
// =============================================================================

/// Default number of dataset questions evaluated.
pub const EVAL_QUESTION_LIMIT: usize = 100;

/// Cutoffs reported as Hits@k.
pub const EVAL_HITS_CUTOFFS: [usize; 3] = [1, 5, 10];
