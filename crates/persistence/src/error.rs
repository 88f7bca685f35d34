//! Persistence error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Store rejected record ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("{failed} of {total} sinks failed: {first}")]
    Partial {
        failed: usize,
        total: usize,
        first: String,
    },
}

impl From<reqwest::Error> for PersistenceError {
    fn from(e: reqwest::Error) -> Self {
        PersistenceError::Http(e.to_string())
    }
}
