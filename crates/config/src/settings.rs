//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    ClassifierConfig, ConfigError, FlowConfig, LlmConfig, PersistenceConfig, SessionConfig,
    SpeechConfig,
};

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Issue classifier thresholds
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Remote language model
    #[serde(default)]
    pub llm: LlmConfig,

    /// Call session store
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Stage behaviour
    #[serde(default)]
    pub flow: FlowConfig,

    /// Completion event storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Optional speech synthesis
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let classifier = &self.classifier;

        if !(0.0..=1.0).contains(&classifier.min_recognition_confidence) {
            return Err(ConfigError::invalid(
                "classifier.min_recognition_confidence",
                "must be between 0.0 and 1.0",
            ));
        }

        if classifier.min_transcript_chars > classifier.max_transcript_chars {
            return Err(ConfigError::invalid(
                "classifier.min_transcript_chars",
                "must not exceed classifier.max_transcript_chars",
            ));
        }

        if classifier.remote_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "classifier.remote_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.sessions.max_sessions == 0 {
            return Err(ConfigError::invalid(
                "sessions.max_sessions",
                "must be greater than zero",
            ));
        }

        if self.sessions.ttl_seconds == 0 {
            return Err(ConfigError::invalid(
                "sessions.ttl_seconds",
                "must be greater than zero",
            ));
        }

        if self.speech.enabled && self.speech.api_key.is_none() {
            tracing::warn!(
                "Speech synthesis enabled without an API key; requests will likely fail"
            );
        }

        if self.llm.enabled && self.llm.api_key.is_none() {
            tracing::warn!("Remote classifier enabled without an API key");
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_true(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Serve Prometheus metrics at `/metrics`
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (HOTLINE_ prefix, e.g. `HOTLINE__LLM__API_KEY`)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder
            .add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("HOTLINE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
