//! Error types shared across the hotline crates

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the hotline core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid reference number: {0}")]
    InvalidReference(String),

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
