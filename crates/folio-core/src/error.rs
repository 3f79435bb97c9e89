use thiserror::Error;

/// Top-level error type for Folio.
///
/// Subsystem crates either return this directly or define their own error
/// type with a `From<FolioError>` conversion so that `?` composes across
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FolioError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Cannot build an index from empty input")]
    EmptyInput,

    #[error("Incompatible embeddings: {left} vs {right}")]
    IncompatibleEmbedding { left: String, right: String },

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<toml::de::Error> for FolioError {
    fn from(err: toml::de::Error) -> Self {
        FolioError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for FolioError {
    fn from(err: toml::ser::Error) -> Self {
        FolioError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for FolioError {
    fn from(err: serde_json::Error) -> Self {
        FolioError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Folio operations.
pub type Result<T> = std::result::Result<T, FolioError>;
