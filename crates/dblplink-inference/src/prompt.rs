//! Prompt templates for evidence scoring and span detection.

/// Build the yes/no plausibility prompt for one evidence line.
///
/// The prompt ends at `Answer:` with the answer slot left empty; the scorer
/// reads the probability of "yes" as the next token.
pub fn evidence_prompt(mention: &str, context: &str, candidate_name: &str, line: &str) -> String {
    format!(
        "You are an assistant linking mentions to entities.\n\
         Document: {context}\n\
         Mention: {mention}\n\
         Candidate Entity: {candidate_name}\n\
         Entity Info: {line}\n\
         Question: Does the mention belong to this entity? Answer: yes/no\n\
         Answer:"
    )
}

/// System prompt for the span detector.
pub const SPAN_SYSTEM_PROMPT: &str = "You are an information extraction assistant.";
