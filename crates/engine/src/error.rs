//! Error types for the generation and verification engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Browser driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("Scenario {0} has no steps")]
    NoSteps(String),

    #[error(transparent)]
    Common(#[from] mailproof_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl EngineError {
    /// Failures that must abort a whole batch or run instead of being
    /// recorded against a single item
    pub fn is_storage(&self) -> bool {
        matches!(self, EngineError::Common(e) if e.is_storage())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Timeout(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
