//! Shared data model for spans, candidates, graph neighborhoods, and linking
//! results.
//!
//! These types are the single wire schema used at every boundary: the HTTP
//! service, the span detector, the candidate retriever, and the evaluation
//! runner all (de)serialize through them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

// =============================================================================
// SPANS
// =============================================================================

/// Semantic type assigned to a detected mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanType {
    Person,
    Publication,
    Venue,
}

impl SpanType {
    pub const ALL: [SpanType; 3] = [SpanType::Person, SpanType::Publication, SpanType::Venue];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Publication => "publication",
            Self::Venue => "venue",
        }
    }
}

impl fmt::Display for SpanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpanType {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "person" => Ok(Self::Person),
            "publication" => Ok(Self::Publication),
            "venue" => Ok(Self::Venue),
            other => Err(Error::InvalidInput(format!("Unknown span type: {}", other))),
        }
    }
}

/// A mention detected in the question text, with its semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub label: String,
    #[serde(rename = "type")]
    pub span_type: SpanType,
}

impl Span {
    pub fn new(label: impl Into<String>, span_type: SpanType) -> Self {
        Self {
            label: label.into(),
            span_type,
        }
    }

    /// The `"label : type"` form reported in `predictedlabelspans`.
    pub fn predicted_label(&self) -> String {
        format!("{} : {}", self.label, self.span_type)
    }
}

// =============================================================================
// CANDIDATES
// =============================================================================

/// A knowledge-graph entity proposed as a referent for a span.
///
/// Serializes as the `[uri, label, type]` triple used on the wire. Both the
/// triple and an object `{uri, label, type}` are accepted when deserializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEntity {
    pub uri: String,
    pub label: String,
    pub entity_type: String,
}

impl CandidateEntity {
    pub fn new(
        uri: impl Into<String>,
        label: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            label: label.into(),
            entity_type: entity_type.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateWire {
    Triple(String, String, String),
    Object {
        uri: String,
        label: String,
        #[serde(rename = "type")]
        entity_type: String,
    },
}

impl Serialize for CandidateEntity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.uri, &self.label, &self.entity_type).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CandidateEntity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match CandidateWire::deserialize(deserializer)? {
            CandidateWire::Triple(uri, label, entity_type) => Self {
                uri,
                label,
                entity_type,
            },
            CandidateWire::Object {
                uri,
                label,
                entity_type,
            } => Self {
                uri,
                label,
                entity_type,
            },
        })
    }
}

// =============================================================================
// GRAPH NEIGHBORHOOD
// =============================================================================

/// One decoded row of a one-hop neighborhood query.
///
/// Outgoing rows carry the raw predicate IRI, incoming rows carry the
/// predicate's resolved label. Any binding may be missing because labels are
/// fetched through OPTIONAL patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NeighborhoodRow {
    Outgoing {
        subject_label: Option<String>,
        predicate: Option<String>,
        object_label: Option<String>,
    },
    Incoming {
        subject_label: Option<String>,
        predicate_label: Option<String>,
        object_label: Option<String>,
    },
}

impl NeighborhoodRow {
    /// Subject, predicate, and object text, whichever shape the row has.
    pub fn parts(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        match self {
            Self::Outgoing {
                subject_label,
                predicate,
                object_label,
            } => (
                subject_label.as_deref(),
                predicate.as_deref(),
                object_label.as_deref(),
            ),
            Self::Incoming {
                subject_label,
                predicate_label,
                object_label,
            } => (
                subject_label.as_deref(),
                predicate_label.as_deref(),
                object_label.as_deref(),
            ),
        }
    }
}

/// Both directions of an entity's one-hop neighborhood, in fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighborhood {
    pub outgoing: Vec<NeighborhoodRow>,
    pub incoming: Vec<NeighborhoodRow>,
}

impl Neighborhood {
    /// Rows fetched in both directions, before linearization drops any.
    pub fn row_count(&self) -> usize {
        self.outgoing.len() + self.incoming.len()
    }
}

/// A complete, labelled edge ready to be rendered as an evidence line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborhoodTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl fmt::Display for NeighborhoodTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} — {} — {}", self.subject, self.predicate, self.object)
    }
}

// =============================================================================
// SCORES AND RESULTS
// =============================================================================

/// Log-probability of the affirmative answer for one evidence line.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceScore {
    pub log_probability: f64,
    pub source_line: String,
}

impl EvidenceScore {
    pub fn new(log_probability: f64, source_line: impl Into<String>) -> Self {
        Self {
            log_probability,
            source_line: source_line.into(),
        }
    }
}

/// A scored candidate. Serializes as `[score, [uri, label, type, evidence]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub uri: String,
    pub label: String,
    pub entity_type: String,
    pub evidence_sentence: String,
    pub score: f64,
}

impl CandidateScore {
    pub fn new(candidate: &CandidateEntity, score: f64, evidence_sentence: impl Into<String>) -> Self {
        Self {
            uri: candidate.uri.clone(),
            label: candidate.label.clone(),
            entity_type: candidate.entity_type.clone(),
            evidence_sentence: evidence_sentence.into(),
            score,
        }
    }
}

impl Serialize for CandidateScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (
            self.score,
            (
                &self.uri,
                &self.label,
                &self.entity_type,
                &self.evidence_sentence,
            ),
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CandidateScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (score, (uri, label, entity_type, evidence_sentence)) =
            <(f64, (String, String, String, String))>::deserialize(deserializer)?;
        Ok(Self {
            uri,
            label,
            entity_type,
            evidence_sentence,
            score,
        })
    }
}

/// Ranked candidates for one span, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSpanResult {
    pub label: String,
    #[serde(rename = "result")]
    pub candidates: Vec<CandidateScore>,
    #[serde(rename = "type")]
    pub span_type: SpanType,
}

impl RankedSpanResult {
    pub fn new(span: &Span, candidates: Vec<CandidateScore>) -> Self {
        Self {
            label: span.label.clone(),
            candidates,
            span_type: span.span_type,
        }
    }
}

/// Final entity linking payload for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkingResult {
    #[serde(rename = "entitylinkingresults")]
    pub ranked_results: Vec<RankedSpanResult>,
    #[serde(rename = "predictedlabelspans")]
    pub predicted_spans: Vec<String>,
    pub question: String,
}
