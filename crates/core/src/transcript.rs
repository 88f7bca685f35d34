//! Inbound speech events from the telephony layer

use serde::{Deserialize, Serialize};

/// One speech-recognition result delivered by the telephony webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechInput {
    /// Opaque call identifier supplied by the telephony provider
    pub call_id: String,

    /// Recognized text
    #[serde(default)]
    pub transcript: String,

    /// Recognition confidence (0.0 - 1.0)
    #[serde(default)]
    pub recognition_confidence: f32,

    /// Caller number, when the provider passes it through
    #[serde(default)]
    pub caller_number: Option<String>,
}

impl SpeechInput {
    /// Create a new speech event
    pub fn new(call_id: impl Into<String>, transcript: impl Into<String>, confidence: f32) -> Self {
        Self {
            call_id: call_id.into(),
            transcript: transcript.into(),
            recognition_confidence: confidence,
            caller_number: None,
        }
    }

    /// Set caller number
    pub fn with_caller(mut self, number: impl Into<String>) -> Self {
        self.caller_number = Some(number.into());
        self
    }

    /// Transcript with surrounding whitespace removed
    pub fn text(&self) -> &str {
        self.transcript.trim()
    }

    /// Check if transcript is empty
    pub fn is_empty(&self) -> bool {
        self.text().is_empty()
    }

    /// Length of the trimmed transcript in characters
    pub fn char_count(&self) -> usize {
        self.text().chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_input() {
        let input = SpeechInput::new("CA123", "  my printer is broken  ", 0.92)
            .with_caller("+15550100");

        assert_eq!(input.text(), "my printer is broken");
        assert_eq!(input.char_count(), 20);
        assert_eq!(input.caller_number.as_deref(), Some("+15550100"));
        assert!(!input.is_empty());
    }

    #[test]
    fn test_deserialize_webhook_payload() {
        let input: SpeechInput = serde_json::from_str(
            r#"{"callId":"CA9","transcript":"hello there","recognitionConfidence":0.7}"#,
        )
        .unwrap();

        assert_eq!(input.call_id, "CA9");
        assert!((input.recognition_confidence - 0.7).abs() < f32::EPSILON);
        assert!(input.caller_number.is_none());
    }

    #[test]
    fn test_missing_transcript_is_empty() {
        let input: SpeechInput = serde_json::from_str(r#"{"callId":"CA1"}"#).unwrap();
        assert!(input.is_empty());
        assert_eq!(input.recognition_confidence, 0.0);
    }
}
