//! Language model backends

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use hotline_config::LlmConfig;

use crate::prompt::Message;
use crate::LlmError;

/// Generation request
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Ask the backend for a JSON object reply
    pub json_mode: bool,
}

impl GenerateRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Generation result
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub total_time_ms: u64,
}

/// Text generation backend
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerationResult, LlmError>;

    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completions backend
pub struct ChatCompletionsBackend {
    client: Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsBackend {
    /// Create a backend; `timeout` bounds the whole HTTP exchange
    pub fn new(config: LlmConfig, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();

        let body = ChatRequest {
            model: &self.config.model,
            messages: &request.messages,
            temperature: request.temperature.unwrap_or(self.config.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            response_format: request.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        let mut http = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            http = http.bearer_auth(key);
        }

        let resp = http.send().await?;
        let status = resp.status();
        let body_text = resp.text().await?;

        tracing::debug!(status = %status, body_len = body_text.len(), "Chat completion response");

        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body_text)?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no choices in completion".to_string()))?;

        Ok(GenerationResult {
            text,
            total_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
