use thiserror::Error;

/// Main error type for GeoKG
#[derive(Error, Debug)]
pub enum KgError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid dictionary or relation-pattern rules
    #[error("Rule set error: {0}")]
    Rules(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document not found in the graph store
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Entity not found in the graph store
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<regex::Error> for KgError {
    fn from(err: regex::Error) -> Self {
        KgError::Rules(err.to_string())
    }
}

/// Convenient Result type using KgError
pub type Result<T> = std::result::Result<T, KgError>;
