//! # dblplink-graph
//!
//! One-hop graph neighborhoods for entity candidates.
//!
//! This crate provides:
//! - A SPARQL fetcher issuing the two fixed neighborhood queries
//!   (outgoing and incoming edges) and decoding rows into typed records
//! - The linearizer turning those rows into evidence lines
//! - An in-memory neighborhood source for tests (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use dblplink_graph::{linearize, SparqlNeighborhoodFetcher};
//! use dblplink_core::NeighborhoodSource;
//!
//! #[tokio::main]
//! async fn main() -> dblplink_core::Result<()> {
//!     let fetcher = SparqlNeighborhoodFetcher::from_env()?;
//!     let hood = fetcher.fetch("https://dblp.org/pid/20/6100").await?;
//!     for line in linearize(&hood.outgoing, &hood.incoming) {
//!         println!("{line}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod linearize;
pub mod sparql;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use linearize::{linearize, linearize_neighborhood, to_triple, ANONYMOUS_NODE_MARKER};
pub use sparql::{incoming_query, outgoing_query, SparqlConfig, SparqlNeighborhoodFetcher};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockNeighborhoodSource;
