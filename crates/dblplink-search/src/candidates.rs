//! Elasticsearch candidate retrieval.
//!
//! Each span is looked up with a label match restricted to the DBLP schema
//! classes that fit its type. Hits keep the index's relevance order.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use dblplink_core::{
    defaults, CandidateEntity, CandidateRetriever, Error, Result, Span, SpanType,
};

const DBLP_SCHEMA: &str = "https://dblp.org/rdf/schema#";

/// Schema class IRIs a candidate must carry to match a span of `span_type`.
pub fn type_filter(span_type: SpanType) -> Vec<String> {
    let classes: &[&str] = match span_type {
        SpanType::Person => &["Creator", "Person"],
        SpanType::Publication => &["Book", "Article", "Publication"],
        SpanType::Venue => &["Stream"],
    };
    classes
        .iter()
        .map(|class| format!("{DBLP_SCHEMA}{class}"))
        .collect()
}

/// Search request body for one span.
pub fn candidate_query(span: &Span, size: usize) -> Value {
    json!({
        "size": size,
        "query": {
            "bool": {
                "must": [
                    {"terms": {"type": type_filter(span.span_type)}},
                    {"match": {"label": span.label}}
                ]
            }
        }
    })
}

/// Configuration for the candidate retriever.
#[derive(Debug, Clone)]
pub struct ElasticConfig {
    /// Elasticsearch base URL.
    pub url: String,
    /// Index holding DBLP entity labels.
    pub index: String,
    /// Hits requested per span.
    pub limit: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            url: defaults::ELASTICSEARCH_URL.to_string(),
            index: defaults::ELASTICSEARCH_INDEX.to_string(),
            limit: defaults::CANDIDATE_LIMIT,
            timeout_secs: defaults::SEARCH_TIMEOUT_SECS,
        }
    }
}

impl ElasticConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// - `ELASTICSEARCH_URL`
    /// - `ELASTICSEARCH_INDEX`
    /// - `CANDIDATE_LIMIT`
    pub fn from_env() -> Self {
        let url = std::env::var("ELASTICSEARCH_URL")
            .unwrap_or_else(|_| defaults::ELASTICSEARCH_URL.to_string());
        let index = std::env::var("ELASTICSEARCH_INDEX")
            .unwrap_or_else(|_| defaults::ELASTICSEARCH_INDEX.to_string());
        let limit = std::env::var("CANDIDATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::CANDIDATE_LIMIT);

        Self {
            url,
            index,
            limit,
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: HitSource,
}

#[derive(Deserialize, Default)]
struct HitSource {
    #[serde(default)]
    label: String,
    #[serde(rename = "type", default)]
    entity_type: Value,
}

/// Render `_source.type`, which is indexed as a string or a list of strings.
fn type_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl SearchHit {
    fn into_candidate(self) -> CandidateEntity {
        CandidateEntity::new(self.id, self.source.label, type_text(&self.source.entity_type))
    }
}

/// Candidate retriever backed by an Elasticsearch label index.
pub struct ElasticCandidateRetriever {
    client: Client,
    config: ElasticConfig,
}

impl ElasticCandidateRetriever {
    pub fn new(config: ElasticConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Initializing candidate retriever: url={}, index={}, limit={}",
            config.url, config.index, config.limit
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ElasticConfig::from_env())
    }

    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    /// Look up candidates for a single span.
    pub async fn search_span(&self, span: &Span) -> Result<Vec<CandidateEntity>> {
        let start = Instant::now();
        let url = format!(
            "{}/{}/_search",
            self.config.url.trim_end_matches('/'),
            self.config.index
        );

        let response = self
            .client
            .post(url)
            .json(&candidate_query(span, self.config.limit))
            .send()
            .await
            .map_err(|e| Error::Search(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!(
                "Elasticsearch returned {}: {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Search(format!("Failed to parse response: {}", e)))?;

        let candidates: Vec<CandidateEntity> = parsed
            .hits
            .hits
            .into_iter()
            .map(SearchHit::into_candidate)
            .collect();

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            span_label = %span.label,
            span_type = %span.span_type,
            candidate_count = candidates.len(),
            duration_ms = elapsed,
            "Candidates retrieved"
        );
        if elapsed > 5000 {
            warn!(duration_ms = elapsed, slow = true, "Slow candidate lookup");
        }
        Ok(candidates)
    }
}

#[async_trait]
impl CandidateRetriever for ElasticCandidateRetriever {
    #[instrument(skip(self, _text, spans), fields(subsystem = "search", component = "elastic", op = "retrieve", span_count = spans.len()))]
    async fn retrieve(&self, _text: &str, spans: &[Span]) -> Result<Vec<Vec<CandidateEntity>>> {
        let mut lists = Vec::with_capacity(spans.len());
        for span in spans {
            lists.push(self.search_span(span).await?);
        }
        Ok(lists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn retriever_for(server: &MockServer) -> ElasticCandidateRetriever {
        ElasticCandidateRetriever::new(ElasticConfig {
            url: server.uri(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_type_filters() {
        assert_eq!(
            type_filter(SpanType::Person),
            vec![
                "https://dblp.org/rdf/schema#Creator",
                "https://dblp.org/rdf/schema#Person"
            ]
        );
        assert_eq!(type_filter(SpanType::Publication).len(), 3);
        assert_eq!(
            type_filter(SpanType::Venue),
            vec!["https://dblp.org/rdf/schema#Stream"]
        );
    }

    #[test]
    fn test_candidate_query_shape() {
        let query = candidate_query(&Span::new("Biemann", SpanType::Person), 10);
        assert_eq!(query["size"], json!(10));
        assert_eq!(
            query["query"]["bool"]["must"][1],
            json!({"match": {"label": "Biemann"}})
        );
        assert_eq!(
            query["query"]["bool"]["must"][0]["terms"]["type"][1],
            json!("https://dblp.org/rdf/schema#Person")
        );
    }

    #[test]
    fn test_type_text_variants() {
        assert_eq!(type_text(&json!("Person")), "Person");
        assert_eq!(
            type_text(&json!(["Creator", "Person"])),
            "Creator, Person"
        );
        assert_eq!(type_text(&Value::Null), "");
    }

    #[tokio::test]
    async fn test_retrieve_one_list_per_span() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dblp/_search"))
            .and(body_string_contains("Biemann"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {"hits": [
                    {"_id": "https://dblp.org/pid/20/6100",
                     "_source": {"label": "Chris Biemann",
                                 "type": ["https://dblp.org/rdf/schema#Creator",
                                          "https://dblp.org/rdf/schema#Person"]}},
                    {"_id": "https://dblp.org/pid/99/1",
                     "_source": {"label": "B. Biemann", "type": "https://dblp.org/rdf/schema#Person"}}
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/dblp/_search"))
            .and(body_string_contains("NeurIPS"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"hits": {"hits": []}})),
            )
            .mount(&server)
            .await;

        let spans = vec![
            Span::new("Biemann", SpanType::Person),
            Span::new("NeurIPS", SpanType::Venue),
        ];
        let lists = retriever_for(&server)
            .retrieve("which papers in neurips was authored by Biemann?", &spans)
            .await
            .unwrap();

        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].len(), 2);
        assert_eq!(lists[0][0].uri, "https://dblp.org/pid/20/6100");
        assert_eq!(lists[0][0].label, "Chris Biemann");
        assert_eq!(
            lists[0][0].entity_type,
            "https://dblp.org/rdf/schema#Creator, https://dblp.org/rdf/schema#Person"
        );
        assert!(lists[1].is_empty());
    }

    #[tokio::test]
    async fn test_index_error_is_search_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dblp/_search"))
            .respond_with(ResponseTemplate::new(404).set_body_string("index_not_found_exception"))
            .mount(&server)
            .await;

        let err = retriever_for(&server)
            .retrieve("q", &[Span::new("x", SpanType::Person)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Search(ref msg) if msg.contains("index_not_found")));
    }

    #[tokio::test]
    async fn test_no_spans_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let lists = retriever_for(&server).retrieve("q", &[]).await.unwrap();
        assert!(lists.is_empty());
    }
}
