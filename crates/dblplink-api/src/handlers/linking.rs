//! Entity linking HTTP handlers.
//!
//! Each pipeline stage is exposed on its own so clients can inspect or
//! replace intermediate results, plus `/link_entities` running all three.

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use dblplink_core::{CandidateEntity, LinkingResult, Span};

use crate::{ApiError, AppState};

// =============================================================================
// BODY FIELDS
// =============================================================================

fn parse_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e.body_text())))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Decode a required, non-empty field of the request body.
fn required<T: DeserializeOwned>(body: &Value, field: &str) -> Result<T, ApiError> {
    let value = body
        .get(field)
        .filter(|v| !is_blank(v))
        .ok_or_else(|| ApiError::BadRequest(format!("Missing '{}' field in JSON body", field)))?;
    serde_json::from_value(value.clone())
        .map_err(|e| ApiError::BadRequest(format!("Invalid '{}' field: {}", field, e)))
}

/// Read the optional `text_match_only` flag, defaulting to false.
fn text_match_only(body: &Value) -> Result<bool, ApiError> {
    match body.get("text_match_only") {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(other) => Err(ApiError::BadRequest(format!(
            "Invalid 'text_match_only' field: expected a boolean, got {}",
            other
        ))),
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /get_spans` with `{question}`.
pub async fn get_spans(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Vec<Span>>, ApiError> {
    let body = parse_body(body)?;
    let question: String = required(&body, "question")?;

    let spans = state.span_detector.detect_spans(&question).await?;
    info!(result_count = spans.len(), "Spans detected");
    Ok(Json(spans))
}

/// `POST /get_candidates` with `{question, spans}`.
pub async fn get_candidates(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Vec<Vec<CandidateEntity>>>, ApiError> {
    let body = parse_body(body)?;
    let question: String = required(&body, "question")?;
    let spans: Vec<Span> = required(&body, "spans")?;

    let candidates = state.retriever.retrieve(&question, &spans).await?;
    info!(
        span_count = spans.len(),
        candidate_count = candidates.iter().map(Vec::len).sum::<usize>(),
        "Candidates retrieved"
    );
    Ok(Json(candidates))
}

/// `POST /get_final_result` with `{question, spans, entity_candidates, text_match_only?}`.
pub async fn get_final_result(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<LinkingResult>, ApiError> {
    let body = parse_body(body)?;
    let question: String = required(&body, "question")?;
    let spans: Vec<Span> = required(&body, "spans")?;
    let candidates: Vec<Vec<CandidateEntity>> = required(&body, "entity_candidates")?;
    let text_match_only = text_match_only(&body)?;

    let start = Instant::now();
    let result = state
        .reranker
        .rerank(&question, &spans, &candidates, text_match_only)
        .await?;
    info!(
        span_count = spans.len(),
        text_match_only,
        duration_ms = start.elapsed().as_millis() as u64,
        "Candidates reranked"
    );
    Ok(Json(result))
}

/// `POST /link_entities` with `{question, text_match_only?}`: detect, retrieve, rerank.
pub async fn link_entities(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<LinkingResult>, ApiError> {
    let body = parse_body(body)?;
    let question: String = required(&body, "question")?;
    let text_match_only = text_match_only(&body)?;
    let start = Instant::now();

    let spans = state.span_detector.detect_spans(&question).await?;
    debug!(
        result_count = spans.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Spans detected"
    );

    let candidates = if spans.is_empty() {
        Vec::new()
    } else {
        state.retriever.retrieve(&question, &spans).await?
    };
    debug!(
        candidate_count = candidates.iter().map(Vec::len).sum::<usize>(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Candidates retrieved"
    );

    let result = state
        .reranker
        .rerank(&question, &spans, &candidates, text_match_only)
        .await?;
    info!(
        span_count = spans.len(),
        text_match_only,
        duration_ms = start.elapsed().as_millis() as u64,
        "Entities linked"
    );
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_rejects_missing_and_blank() {
        let body = json!({"question": "  ", "spans": []});
        for field in ["question", "spans", "entity_candidates"] {
            match required::<Value>(&body, field) {
                Err(ApiError::BadRequest(msg)) => {
                    assert_eq!(msg, format!("Missing '{}' field in JSON body", field))
                }
                _ => panic!("expected bad request for {field}"),
            }
        }
    }

    #[test]
    fn test_required_decodes_spans() {
        let body = json!({"spans": [{"label": "Biemann", "type": "person"}]});
        let spans: Vec<Span> = required(&body, "spans").unwrap();
        assert_eq!(spans[0].label, "Biemann");
    }

    #[test]
    fn test_required_reports_bad_shape() {
        let body = json!({"spans": [{"label": "Biemann", "type": "city"}]});
        assert!(matches!(
            required::<Vec<Span>>(&body, "spans"),
            Err(ApiError::BadRequest(msg)) if msg.starts_with("Invalid 'spans'")
        ));
    }

    #[test]
    fn test_text_match_only_flag() {
        assert!(!text_match_only(&json!({})).unwrap());
        assert!(text_match_only(&json!({"text_match_only": true})).unwrap());
        assert!(text_match_only(&json!({"text_match_only": "yes"})).is_err());
    }
}
