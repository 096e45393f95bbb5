//! Error types for dblplink.

use thiserror::Error;

/// Result type alias using dblplink's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dblplink operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Graph endpoint request or result decoding failed
    #[error("Graph error: {0}")]
    Graph(String),

    /// Tokenization, scoring model, or generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Candidate index lookup failed
    #[error("Search error: {0}")]
    Search(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from an upstream service (graph endpoint,
    /// search index, language models) rather than from the request itself.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Graph(_) | Error::Search(_) | Error::Inference(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
