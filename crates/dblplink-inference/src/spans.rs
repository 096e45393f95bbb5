//! LLM span detection.
//!
//! The model is asked for a JSON array of `{label, type}` objects. Chat
//! models often wrap the array in prose or repeat the instruction's example,
//! so the last bracketed array of objects in the output is taken as the
//! answer.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use dblplink_core::{GenerationBackend, Result, Span, SpanDetector, SpanType};

use crate::prompt::SPAN_SYSTEM_PROMPT;

/// Build the user prompt asking for typed entity mentions in `text`.
pub fn span_prompt(text: &str) -> String {
    format!(
        "Extract named entities from the following sentence and classify them into one of the following types: person, publication, venue.\n\
         Let the output be a JSON array of objects with fields 'label' and 'type'.\n\
         Sentence: \"{text}\"\n\
         Entities:"
    )
}

#[derive(Deserialize)]
struct RawSpan {
    label: String,
    #[serde(rename = "type")]
    span_type: String,
}

/// Parse typed spans out of raw model output.
///
/// Returns an empty list when no array is found or it fails to parse.
/// Entries with an unknown type are skipped.
pub fn extract_spans(output: &str) -> Vec<Span> {
    let pattern = match Regex::new(r"(?s)\[\s*\{.*?\}\s*\]") {
        Ok(pattern) => pattern,
        Err(e) => {
            warn!(error = %e, "Invalid span pattern");
            return vec![];
        }
    };

    let Some(json) = pattern.find_iter(output).last() else {
        warn!(response_len = output.len(), "No JSON array found in model output");
        return vec![];
    };

    let raw: Vec<RawSpan> = match serde_json::from_str(json.as_str()) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, matched = json.as_str(), "Failed to decode span array");
            return vec![];
        }
    };

    raw.into_iter()
        .filter_map(|span| match span.span_type.trim().parse::<SpanType>() {
            Ok(span_type) => Some(Span::new(span.label, span_type)),
            Err(_) => {
                warn!(
                    span_label = %span.label,
                    span_type = %span.span_type,
                    "Skipping span with unknown type"
                );
                None
            }
        })
        .collect()
}

/// Span detector backed by a chat model.
pub struct LlmSpanDetector {
    backend: Arc<dyn GenerationBackend>,
}

impl LlmSpanDetector {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SpanDetector for LlmSpanDetector {
    #[instrument(skip(self, text), fields(subsystem = "inference", component = "span_detector", op = "detect_spans", model = self.backend.model_name()))]
    async fn detect_spans(&self, text: &str) -> Result<Vec<Span>> {
        let output = self
            .backend
            .generate_with_system(SPAN_SYSTEM_PROMPT, &span_prompt(text))
            .await?;
        let spans = extract_spans(&output);
        debug!(result_count = spans.len(), "Spans detected");
        Ok(spans)
    }
}
