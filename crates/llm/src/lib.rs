//! LLM and speech-synthesis clients
//!
//! Features:
//! - Chat message and prompt building
//! - `LanguageModel` trait with an OpenAI-compatible chat completions backend
//! - `SpeechSynthesizer` trait with an HTTP text-to-speech backend

pub mod backend;
pub mod prompt;
pub mod speech;

pub use backend::{ChatCompletionsBackend, GenerateRequest, GenerationResult, LanguageModel};
pub use prompt::{extract_json_object, Message, PromptBuilder, Role};
pub use speech::{HttpSpeechSynthesizer, SpeechSynthesizer, SynthesizedAudio};

use thiserror::Error;

/// LLM and synthesis errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::InvalidResponse(err.to_string())
    }
}
