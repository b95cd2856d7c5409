use thiserror::Error;

#[derive(Debug, Error)]
pub enum PharmakonError {
    /// Caller bug: bad chunking parameters, bad regex pattern, etc.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A required file, table, or remote target does not exist.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Missing credential or incompatible configuration, surfaced before any work.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// An embedding or vector-store call failed. Not retried; already-flushed
    /// batches are not rolled back.
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PharmakonError>;
