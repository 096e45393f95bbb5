//! SPARQL neighborhood fetcher.
//!
//! Issues the two fixed neighborhood queries for an entity against a
//! SPARQL endpoint and decodes the JSON result bindings into
//! [`NeighborhoodRow`] values at the boundary.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, trace, warn};

use dblplink_core::{defaults, Error, Neighborhood, NeighborhoodRow, NeighborhoodSource, Result};

/// Namespace prefixes shared by both neighborhood queries.
const PREFIXES: &str = "\
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
PREFIX dc: <http://purl.org/dc/elements/1.1/>
PREFIX foaf: <http://xmlns.com/foaf/0.1/>
PREFIX dblp: <https://dblp.org/rdf/schema#>";

/// Label-like properties, in priority order, used to name graph nodes.
pub const LABEL_PATH: &str =
    "rdfs:label|skos:prefLabel|dc:title|foaf:name|dblp:abstract|dc:description|dblp:title";

/// Structural/provenance predicates excluded from neighborhoods.
pub const EXCLUDED_PREDICATES: [&str; 3] = [
    "dblp:signatureCreator",
    "dblp:signaturePublication",
    "dblp:hasSignature",
];

/// `Accept` header value for SPARQL JSON results.
const SPARQL_JSON: &str = "application/sparql-results+json";

/// Characters that cannot appear inside an `<...>` IRI reference.
const IRI_FORBIDDEN: &[char] = &['<', '>', '"', '{', '}', '|', '^', '`', '\\'];

fn validate_iri(entity_uri: &str) -> Result<()> {
    if entity_uri.is_empty() {
        return Err(Error::InvalidInput("Entity URI is empty".to_string()));
    }
    if entity_uri
        .chars()
        .any(|c| c.is_whitespace() || IRI_FORBIDDEN.contains(&c))
    {
        return Err(Error::InvalidInput(format!(
            "Entity URI is not a valid IRI: {}",
            entity_uri
        )));
    }
    Ok(())
}

fn neighborhood_query(select: &str, binding: &str, entity_uri: &str, limit: usize) -> String {
    format!(
        "{PREFIXES}

SELECT DISTINCT {select} WHERE {{
    VALUES {binding} {{ <{entity_uri}> }}
    ?s ?p ?o .
    OPTIONAL {{ ?s {LABEL_PATH} ?sLabel }}
    OPTIONAL {{ ?p {LABEL_PATH} ?pLabel }}
    OPTIONAL {{ ?o {LABEL_PATH} ?oLabel }}
    FILTER (?p NOT IN ({excluded}))
}} LIMIT {limit}",
        excluded = EXCLUDED_PREDICATES.join(","),
    )
}

/// Query selecting `?sLabel ?p ?oLabel` for edges leaving `entity_uri`.
pub fn outgoing_query(entity_uri: &str, limit: usize) -> String {
    neighborhood_query("?sLabel ?p ?oLabel", "?s", entity_uri, limit)
}

/// Query selecting `?sLabel ?pLabel ?oLabel` for edges entering `entity_uri`.
pub fn incoming_query(entity_uri: &str, limit: usize) -> String {
    neighborhood_query("?sLabel ?pLabel ?oLabel", "?o", entity_uri, limit)
}

/// Configuration for the SPARQL fetcher.
#[derive(Debug, Clone)]
pub struct SparqlConfig {
    /// Query endpoint URL.
    pub endpoint: String,
    /// Row cap per direction.
    pub row_limit: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SparqlConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::SPARQL_ENDPOINT.to_string(),
            row_limit: defaults::NEIGHBORHOOD_ROW_LIMIT,
            timeout_secs: defaults::SPARQL_TIMEOUT_SECS,
        }
    }
}

impl SparqlConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// - `SPARQL_ENDPOINT`
    /// - `SPARQL_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let endpoint = std::env::var("SPARQL_ENDPOINT")
            .unwrap_or_else(|_| defaults::SPARQL_ENDPOINT.to_string());
        let timeout_secs = std::env::var("SPARQL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::SPARQL_TIMEOUT_SECS);

        Self {
            endpoint,
            timeout_secs,
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Deserialize)]
struct SparqlResults {
    bindings: Vec<HashMap<String, SparqlTerm>>,
}

#[derive(Deserialize)]
struct SparqlTerm {
    value: String,
}

type Binding = HashMap<String, SparqlTerm>;

fn take(binding: &mut Binding, var: &str) -> Option<String> {
    binding.remove(var).map(|term| term.value)
}

fn decode_outgoing(bindings: Vec<Binding>) -> Vec<NeighborhoodRow> {
    bindings
        .into_iter()
        .map(|mut b| NeighborhoodRow::Outgoing {
            subject_label: take(&mut b, "sLabel"),
            predicate: take(&mut b, "p"),
            object_label: take(&mut b, "oLabel"),
        })
        .collect()
}

fn decode_incoming(bindings: Vec<Binding>) -> Vec<NeighborhoodRow> {
    bindings
        .into_iter()
        .map(|mut b| NeighborhoodRow::Incoming {
            subject_label: take(&mut b, "sLabel"),
            predicate_label: take(&mut b, "pLabel"),
            object_label: take(&mut b, "oLabel"),
        })
        .collect()
}

/// Fetches one-hop neighborhoods from a SPARQL endpoint.
pub struct SparqlNeighborhoodFetcher {
    client: Client,
    config: SparqlConfig,
}

impl SparqlNeighborhoodFetcher {
    /// Create a fetcher with the given configuration.
    pub fn new(config: SparqlConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Initializing SPARQL fetcher: endpoint={}, row_limit={}",
            config.endpoint, config.row_limit
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(SparqlConfig::from_env())
    }

    pub fn config(&self) -> &SparqlConfig {
        &self.config
    }

    async fn select(&self, query: &str) -> Result<Vec<Binding>> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .header(reqwest::header::ACCEPT, SPARQL_JSON)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| Error::Graph(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Graph(format!(
                "SPARQL endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: SparqlResponse = response
            .json()
            .await
            .map_err(|e| Error::Graph(format!("Failed to parse response: {}", e)))?;

        Ok(parsed.results.bindings)
    }
}

#[async_trait]
impl NeighborhoodSource for SparqlNeighborhoodFetcher {
    #[instrument(skip(self), fields(subsystem = "graph", component = "sparql", op = "fetch"))]
    async fn fetch(&self, entity_uri: &str) -> Result<Neighborhood> {
        validate_iri(entity_uri)?;
        let start = Instant::now();

        let outgoing = self
            .select(&outgoing_query(entity_uri, self.config.row_limit))
            .await?;
        let incoming = self
            .select(&incoming_query(entity_uri, self.config.row_limit))
            .await?;

        let neighborhood = Neighborhood {
            outgoing: decode_outgoing(outgoing),
            incoming: decode_incoming(incoming),
        };

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            outgoing = neighborhood.outgoing.len(),
            incoming = neighborhood.incoming.len(),
            duration_ms = elapsed,
            "Neighborhood fetched"
        );
        trace!(rows = ?neighborhood, "Neighborhood rows");
        if elapsed > 5000 {
            warn!(duration_ms = elapsed, slow = true, "Slow neighborhood fetch");
        }
        Ok(neighborhood)
    }
}
