//! Hotline IVR Server
//!
//! HTTP endpoints called by the telephony provider and by operators.

pub mod audio;
pub mod http;
pub mod metrics;
pub mod state;

pub use audio::{AudioCache, VoicePrompter};
pub use http::create_router;
pub use metrics::init_metrics;
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use hotline_agent::RegistryError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Startup error: {0}")]
    Startup(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Startup(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RegistryError> for ServerError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownReference(r) => ServerError::NotFound(format!("reference {}", r)),
            e @ RegistryError::AmbiguousReference { .. } => ServerError::Conflict(e.to_string()),
            RegistryError::InvalidStatus(s) => {
                ServerError::InvalidRequest(format!("unknown status {}", s))
            }
            RegistryError::Store(e) => ServerError::Internal(e.to_string()),
        }
    }
}

impl From<hotline_persistence::PersistenceError> for ServerError {
    fn from(err: hotline_persistence::PersistenceError) -> Self {
        ServerError::Startup(err.to_string())
    }
}

impl From<hotline_llm::LlmError> for ServerError {
    fn from(err: hotline_llm::LlmError) -> Self {
        ServerError::Startup(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status = StatusCode::from(self);
        if status.is_server_error() {
            tracing::error!(error = %message, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
