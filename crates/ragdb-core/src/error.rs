use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A vector's length differs from the index dimension. Fatal to the one
    /// insert or search it belongs to.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding collaborator failed. Recovered by the fallback embedder,
    /// surfaced only by code that calls a provider directly.
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Persisted state was built by a different embedding method.
    #[error("Persisted index built with '{persisted}', configured embedder is '{configured}'")]
    SchemaStale { persisted: String, configured: String },

    /// Growing the vector arena failed; the index keeps its previous capacity.
    #[error("Capacity exhausted: cannot grow vector index to {requested} entries")]
    CapacityExhausted { requested: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt persisted state: {0}")]
    Corrupt(String),

    #[error("Lexical index failure: {0}")]
    Lexical(String),

    /// A task on the blocking pool panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Background(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors that abort a whole batch rather than the single document.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::DimensionMismatch { .. } | Error::EmbeddingUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
