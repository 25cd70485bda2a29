//! Error types for cvroute.

use thiserror::Error;

/// Result type alias using cvroute's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cvroute operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid credentials/configuration for an external dependency
    #[error("Configuration error: {0}")]
    Config(String),

    /// Uploaded file could not be turned into text
    #[error("Document read error: {0}")]
    DocumentRead(String),

    /// Field extraction failed (backend error or non-conforming output)
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Inference/generation call failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid input (malformed export payload, empty upload, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Sheet creation or append failed for one routing key
    #[error("Export error: {0}")]
    Export(String),

    /// Sheet registry storage failed
    #[error("Registry error: {0}")]
    Registry(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
