//! Structured logging schema and field name constants for dblplink.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, dropped candidates, request completions |
//! | DEBUG | Decision points, per-candidate timings, config choices |
//! | TRACE | Per-line scores, raw query rows |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the HTTP layer.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "graph", "inference", "search"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "sparql", "yes_scorer", "ollama", "elastic", "reranker"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "fetch", "score_lines", "generate", "retrieve", "rerank"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Candidate entity URI being processed.
pub const ENTITY_URI: &str = "entity_uri";

/// Span label (mention text) being linked.
pub const SPAN_LABEL: &str = "span_label";

/// Span type ("person", "publication", "venue").
pub const SPAN_TYPE: &str = "span_type";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a query or retrieval.
pub const RESULT_COUNT: &str = "result_count";

/// Number of evidence lines scored for one candidate.
pub const LINE_COUNT: &str = "line_count";

/// Neighborhood rows fetched for one candidate, before linearization.
pub const ROW_COUNT: &str = "row_count";

/// Number of candidates considered for one span.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Padded sequence length of a scoring batch.
pub const PADDED_LEN: &str = "padded_len";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Aggregate log-probability assigned to a candidate.
pub const SCORE: &str = "score";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
