//! Call-flow configuration: classifier thresholds, stage behaviour, session eviction

use serde::{Deserialize, Serialize};

/// Issue classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Minimum speech-recognition confidence accepted at the initial stage
    #[serde(default = "default_min_recognition_confidence")]
    pub min_recognition_confidence: f32,

    /// Transcripts shorter than this (in characters) are re-prompted
    #[serde(default = "default_min_transcript_chars")]
    pub min_transcript_chars: usize,

    /// Transcripts longer than this (in characters) are re-prompted
    #[serde(default = "default_max_transcript_chars")]
    pub max_transcript_chars: usize,

    /// Hard bound on the remote classification call
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// Context turns sent along with the transcript
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,

    /// Turns retained per call in conversation context
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,

    /// Confidence reported when the remote call fails and we escalate anyway
    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: f32,

    /// Confidence reported for a keyword verdict
    #[serde(default = "default_keyword_confidence")]
    pub keyword_confidence: f32,
}

fn default_min_recognition_confidence() -> f32 {
    0.4
}
fn default_min_transcript_chars() -> usize {
    3
}
fn default_max_transcript_chars() -> usize {
    500
}
fn default_remote_timeout_ms() -> u64 {
    8000
}
fn default_context_turns() -> usize {
    3
}
fn default_max_context_turns() -> usize {
    20
}
fn default_fallback_confidence() -> f32 {
    0.3
}
fn default_keyword_confidence() -> f32 {
    0.85
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_recognition_confidence: default_min_recognition_confidence(),
            min_transcript_chars: default_min_transcript_chars(),
            max_transcript_chars: default_max_transcript_chars(),
            remote_timeout_ms: default_remote_timeout_ms(),
            context_turns: default_context_turns(),
            max_context_turns: default_max_context_turns(),
            fallback_confidence: default_fallback_confidence(),
            keyword_confidence: default_keyword_confidence(),
        }
    }
}

/// Stage behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Consecutive re-prompts tolerated in one stage before the call is closed
    #[serde(default = "default_max_reprompts")]
    pub max_reprompts: u32,

    /// Response window promised to urgent callers
    #[serde(default = "default_urgent_response_window")]
    pub urgent_response_window: String,

    /// Business name used in prompts
    #[serde(default = "default_business_name")]
    pub business_name: String,
}

fn default_max_reprompts() -> u32 {
    3
}
fn default_urgent_response_window() -> String {
    "within 30 minutes".to_string()
}
fn default_business_name() -> String {
    "business support".to_string()
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_reprompts: default_max_reprompts(),
            urgent_response_window: default_urgent_response_window(),
            business_name: default_business_name(),
        }
    }
}

/// Call session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is evicted
    #[serde(default = "default_session_ttl")]
    pub ttl_seconds: u64,

    /// Ceiling on tracked sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// How often the background sweep runs
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_session_ttl() -> u64 {
    4 * 3600
}
fn default_max_sessions() -> usize {
    1000
}
fn default_cleanup_interval() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_session_ttl(),
            max_sessions: default_max_sessions(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}
