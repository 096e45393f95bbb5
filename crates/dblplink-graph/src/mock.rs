//! In-memory neighborhood source for deterministic testing.
//!
//! ## Usage
//!
//! ```rust
//! use dblplink_graph::MockNeighborhoodSource;
//!
//! let source = MockNeighborhoodSource::new()
//!     .with_outgoing("https://dblp.org/pid/20/6100", "Chris Biemann", "orcid", "0000-0002");
//! assert_eq!(source.fetch_count(), 0);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use dblplink_core::{Error, Neighborhood, NeighborhoodRow, NeighborhoodSource, Result};

/// Neighborhood source backed by a fixed map of entity URI to rows.
///
/// Unknown URIs yield an empty neighborhood. Every fetch is logged.
#[derive(Clone, Default)]
pub struct MockNeighborhoodSource {
    neighborhoods: HashMap<String, Neighborhood>,
    failing: HashSet<String>,
    fetch_log: Arc<Mutex<Vec<String>>>,
}

impl MockNeighborhoodSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a complete neighborhood for `uri`.
    pub fn with_neighborhood(mut self, uri: impl Into<String>, neighborhood: Neighborhood) -> Self {
        self.neighborhoods.insert(uri.into(), neighborhood);
        self
    }

    /// Append one outgoing row for `uri`.
    pub fn with_outgoing(mut self, uri: &str, subject: &str, predicate: &str, object: &str) -> Self {
        self.neighborhoods
            .entry(uri.to_string())
            .or_default()
            .outgoing
            .push(NeighborhoodRow::Outgoing {
                subject_label: Some(subject.to_string()),
                predicate: Some(predicate.to_string()),
                object_label: Some(object.to_string()),
            });
        self
    }

    /// Append one incoming row for `uri`.
    pub fn with_incoming(mut self, uri: &str, subject: &str, predicate: &str, object: &str) -> Self {
        self.neighborhoods
            .entry(uri.to_string())
            .or_default()
            .incoming
            .push(NeighborhoodRow::Incoming {
                subject_label: Some(subject.to_string()),
                predicate_label: Some(predicate.to_string()),
                object_label: Some(object.to_string()),
            });
        self
    }

    /// Make fetches of `uri` fail with a graph transport error.
    pub fn with_failure(mut self, uri: impl Into<String>) -> Self {
        self.failing.insert(uri.into());
        self
    }

    /// URIs fetched so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetch_log.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_log.lock().unwrap().len()
    }
}

#[async_trait]
impl NeighborhoodSource for MockNeighborhoodSource {
    async fn fetch(&self, entity_uri: &str) -> Result<Neighborhood> {
        self.fetch_log.lock().unwrap().push(entity_uri.to_string());
        if self.failing.contains(entity_uri) {
            return Err(Error::Graph(format!(
                "Mock endpoint unreachable for {}",
                entity_uri
            )));
        }
        Ok(self
            .neighborhoods
            .get(entity_uri)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_registered_rows() {
        let source = MockNeighborhoodSource::new()
            .with_outgoing("a", "A", "p", "x")
            .with_incoming("a", "B", "q", "A");
        let hood = source.fetch("a").await.unwrap();
        assert_eq!(hood.outgoing.len(), 1);
        assert_eq!(hood.incoming.len(), 1);
        assert!(source.fetch("unknown").await.unwrap().is_empty());
        assert_eq!(source.fetched(), vec!["a", "unknown"]);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let source = MockNeighborhoodSource::new().with_failure("down");
        assert!(matches!(source.fetch("down").await, Err(Error::Graph(_))));
        assert_eq!(source.fetch_count(), 1);
    }
}
