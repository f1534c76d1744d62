//! Error types for the notebook backend.

use crate::provider::ProviderError;
use thiserror::Error;

/// Library-level error type for notebook operations.
#[derive(Error, Debug)]
pub enum NotebookError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Model '{0}' is not supported.")]
    UnsupportedModel(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for notebook operations.
pub type Result<T> = std::result::Result<T, NotebookError>;
