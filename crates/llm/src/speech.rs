//! Text-to-speech collaborators

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use hotline_config::SpeechConfig;

use crate::LlmError;

/// Synthesized audio clip
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Turns response text into audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, LlmError>;
}

/// HTTP TTS backend (ElevenLabs-style `POST {endpoint}/{voice_id}`)
pub struct HttpSpeechSynthesizer {
    client: Client,
    config: SpeechConfig,
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
}

impl HttpSpeechSynthesizer {
    pub fn new(config: SpeechConfig) -> Result<Self, LlmError> {
        let api_key_missing = config.api_key.as_deref().map_or(true, str::is_empty);
        if api_key_missing {
            return Err(LlmError::NotConfigured("speech.api_key".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), self.config.voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, LlmError> {
        let mut http = self
            .client
            .post(self.url())
            .header("accept", "audio/mpeg")
            .json(&SynthesisRequest { text });
        if let Some(key) = &self.config.api_key {
            http = http.header("xi-api-key", key);
        }

        let resp = http.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let mime_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let bytes = resp.bytes().await?.to_vec();

        if bytes.is_empty() {
            return Err(LlmError::InvalidResponse("empty audio body".to_string()));
        }

        tracing::debug!(bytes = bytes.len(), mime_type = %mime_type, "Synthesized response audio");

        Ok(SynthesizedAudio { bytes, mime_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let result = HttpSpeechSynthesizer::new(SpeechConfig::default());
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn test_url() {
        let config = SpeechConfig {
            api_key: Some("key".to_string()),
            endpoint: "https://tts.example.com/v1/text-to-speech/".to_string(),
            voice_id: "voice1".to_string(),
            ..SpeechConfig::default()
        };
        let synth = HttpSpeechSynthesizer::new(config).unwrap();
        assert_eq!(synth.url(), "https://tts.example.com/v1/text-to-speech/voice1");
    }
}
