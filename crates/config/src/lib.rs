//! Configuration management for the hotline IVR
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (HOTLINE_ prefix, `__` separator)

pub mod agent;
pub mod integrations;
pub mod settings;

pub use agent::{ClassifierConfig, FlowConfig, SessionConfig};
pub use integrations::{LlmConfig, PersistenceConfig, SpeechConfig};
pub use settings::{load_settings, ObservabilityConfig, ServerConfig, Settings};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
