//! Error types for mailproof

use thiserror::Error;

/// Result type alias using mailproof Error
pub type Result<T> = std::result::Result<T, Error>;

/// mailproof error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid step: {0}")]
    InvalidStep(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        Error::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    /// Whether the sink itself is unreachable or broken.
    ///
    /// Only these errors are allowed to escape a generation batch or a
    /// verification run; everything else is recorded against the item.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Database(_))
    }
}
