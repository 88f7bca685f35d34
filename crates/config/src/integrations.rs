//! External collaborators: language model, speech synthesis, completion storage

use serde::{Deserialize, Serialize};

/// Remote language model used as the classifier fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Enable the remote classifier; when off, ties escalate immediately
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key (set via HOTLINE__LLM__API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_true() -> bool {
    true
}
fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    150
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_llm_endpoint(),
            api_key: None,
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Optional text-to-speech
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the TTS API; the voice id is appended
    #[serde(default = "default_speech_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_voice_id")]
    pub voice_id: String,

    #[serde(default = "default_speech_timeout")]
    pub timeout_ms: u64,

    /// Synthesized clips kept for the telephony layer to fetch
    #[serde(default = "default_audio_cache_entries")]
    pub cache_entries: usize,

    /// Externally reachable base URL used to build audio links
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

fn default_speech_endpoint() -> String {
    "https://api.elevenlabs.io/v1/text-to-speech".to_string()
}
fn default_voice_id() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}
fn default_speech_timeout() -> u64 {
    4000
}
fn default_audio_cache_entries() -> usize {
    256
}
fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_speech_endpoint(),
            api_key: None,
            voice_id: default_voice_id(),
            timeout_ms: default_speech_timeout(),
            cache_entries: default_audio_cache_entries(),
            public_base_url: default_public_base_url(),
        }
    }
}

/// Completion event storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Append-only JSON-lines log of completions and status updates
    #[serde(default)]
    pub jsonl_path: Option<String>,

    /// Spreadsheet webhook (e.g. an Apps Script deployment) receiving one row per event
    #[serde(default)]
    pub sheet_webhook_url: Option<String>,

    #[serde(default = "default_persistence_timeout")]
    pub timeout_ms: u64,
}

fn default_persistence_timeout() -> u64 {
    5000
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            jsonl_path: None,
            sheet_webhook_url: None,
            timeout_ms: default_persistence_timeout(),
        }
    }
}
