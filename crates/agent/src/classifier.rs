//! Issue classification
//!
//! Three steps, cheapest first:
//! 1. Input validation rejects empty, too short, too long or noise-only
//!    transcripts with a "please repeat" outcome.
//! 2. A keyword pre-filter settles clear cases without a network call.
//! 3. Ties go to one remote model call raced against a timeout; any failure
//!    there classifies the call as urgent.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use hotline_config::ClassifierConfig;
use hotline_core::{attempt_within, Turn, TurnRole};
use hotline_llm::{extract_json_object, GenerateRequest, LanguageModel, Message, PromptBuilder};

use crate::context::ConversationContexts;

static NOISE_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)^(?:
            (?:u+m+|u+h+|u+h+m+|h+m+|m+|e+r+|e+r+m+|a+h+|o+h+
              |hello|hi|hey|yes|yeah|yep|yup|no|nope|nah
              |ok|okay|sure|thanks|thank\ you|right|alright|what|huh)
            [\s,.!?]*
        )+$",
    )
    .unwrap()
});

const URGENT_KEYWORDS: &[&str] = &[
    "down",
    "not working",
    "stopped working",
    "broken",
    "outage",
    "offline",
    "crash",
    "emergency",
    "urgent",
    "asap",
    "immediately",
    "critical",
    "hacked",
    "breach",
    "virus",
    "ransomware",
    "data loss",
    "lost data",
    "can't pay",
    "cannot pay",
    "can't access",
    "cannot access",
    "locked out",
    "losing money",
    "losing sales",
    "no power",
    "flood",
    "leak",
];

const NON_URGENT_KEYWORDS: &[&str] = &[
    "question",
    "how do i",
    "how to",
    "information",
    "info about",
    "change my",
    "update my",
    "settings",
    "account",
    "billing",
    "invoice",
    "pricing",
    "price",
    "quote",
    "upgrade",
    "new service",
    "appointment",
    "schedule",
    "call back",
    "callback",
    "general",
    "wondering",
    "curious",
    "feedback",
];

const URGENT_ACK: &str = "I understand, that sounds urgent and we'll get someone on it right away.";
const NON_URGENT_ACK: &str = "Thanks, that's something our team can help you with.";
const FALLBACK_ACK: &str =
    "I want to make sure this is handled quickly, so I'm treating it as urgent.";

/// Urgency verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Urgent,
    NotUrgent,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Urgent => "urgent",
            Urgency::NotUrgent => "not_urgent",
        }
    }

    fn parse_loose(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "urgent" => Some(Urgency::Urgent),
            "not_urgent" | "non_urgent" | "nonurgent" => Some(Urgency::NotUrgent),
            _ => None,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which step produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    Keyword,
    Remote,
    Fallback,
}

impl VerdictSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictSource::Keyword => "keyword",
            VerdictSource::Remote => "remote",
            VerdictSource::Fallback => "fallback",
        }
    }
}

/// Why a transcript was not classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRejection {
    Empty,
    TooShort,
    TooLong,
    Noise,
    LowConfidence,
}

impl InputRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputRejection::Empty => "empty",
            InputRejection::TooShort => "too_short",
            InputRejection::TooLong => "too_long",
            InputRejection::Noise => "noise",
            InputRejection::LowConfidence => "low_confidence",
        }
    }
}

impl fmt::Display for InputRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub urgency: Urgency,
    pub confidence: f32,
    pub response_text: String,
    pub requires_address: bool,
    pub source: VerdictSource,
}

impl Classification {
    fn new(
        urgency: Urgency,
        confidence: f32,
        response_text: impl Into<String>,
        source: VerdictSource,
    ) -> Self {
        Self {
            urgency,
            confidence,
            response_text: response_text.into(),
            requires_address: urgency == Urgency::Urgent,
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClassifyOutcome {
    NeedsRepeat(InputRejection),
    Verdict(Classification),
}

/// Transcript validation rules shared by every collecting stage
#[derive(Debug, Clone, Copy)]
pub struct InputValidator {
    min_chars: usize,
    max_chars: usize,
}

impl InputValidator {
    pub fn new(min_chars: usize, max_chars: usize) -> Self {
        Self { min_chars, max_chars }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(config.min_transcript_chars, config.max_transcript_chars)
    }

    pub fn validate(&self, transcript: &str) -> Result<(), InputRejection> {
        let text = transcript.trim();
        let chars = text.chars().count();

        if chars == 0 {
            return Err(InputRejection::Empty);
        }
        if chars < self.min_chars {
            return Err(InputRejection::TooShort);
        }
        if chars > self.max_chars {
            return Err(InputRejection::TooLong);
        }
        if NOISE_ONLY.is_match(&text.to_lowercase()) {
            return Err(InputRejection::Noise);
        }
        Ok(())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}

/// Keyword hits for a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeywordMatch {
    pub urgent: usize,
    pub non_urgent: usize,
}

impl KeywordMatch {
    pub fn count(transcript: &str) -> Self {
        let text = normalize(transcript);
        let hits = |set: &[&str]| set.iter().filter(|k| text.contains(*k)).count();

        Self {
            urgent: hits(URGENT_KEYWORDS),
            non_urgent: hits(NON_URGENT_KEYWORDS),
        }
    }

    /// A verdict when one side strictly wins
    pub fn verdict(&self) -> Option<Urgency> {
        if self.urgent > self.non_urgent {
            Some(Urgency::Urgent)
        } else if self.non_urgent > self.urgent {
            Some(Urgency::NotUrgent)
        } else {
            None
        }
    }
}

fn normalize(transcript: &str) -> String {
    transcript
        .to_lowercase()
        .replace(['\u{2019}', '\u{2018}'], "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Deserialize)]
struct RemoteVerdict {
    urgency: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    response: Option<String>,
}

/// Issue classifier
pub struct IssueClassifier {
    config: ClassifierConfig,
    business_name: String,
    validator: InputValidator,
    llm: Option<Arc<dyn LanguageModel>>,
    contexts: Arc<ConversationContexts>,
}

impl IssueClassifier {
    pub fn new(
        config: ClassifierConfig,
        business_name: impl Into<String>,
        llm: Option<Arc<dyn LanguageModel>>,
        contexts: Arc<ConversationContexts>,
    ) -> Self {
        Self {
            validator: InputValidator::from_config(&config),
            config,
            business_name: business_name.into(),
            llm,
            contexts,
        }
    }

    pub fn validator(&self) -> &InputValidator {
        &self.validator
    }

    pub async fn classify(&self, call_id: &str, transcript: &str) -> ClassifyOutcome {
        if let Err(rejection) = self.validator.validate(transcript) {
            tracing::debug!(call_id = %call_id, reason = %rejection, "Transcript needs repeat");
            return ClassifyOutcome::NeedsRepeat(rejection);
        }

        let text = transcript.trim();
        let matched = KeywordMatch::count(text);

        let classification = match matched.verdict() {
            Some(urgency) => {
                let ack = match urgency {
                    Urgency::Urgent => URGENT_ACK,
                    Urgency::NotUrgent => NON_URGENT_ACK,
                };
                Classification::new(
                    urgency,
                    self.config.keyword_confidence,
                    ack,
                    VerdictSource::Keyword,
                )
            }
            None => self.classify_remote(call_id, text).await,
        };

        tracing::info!(
            call_id = %call_id,
            urgency = %classification.urgency,
            source = ?classification.source,
            confidence = classification.confidence,
            urgent_hits = matched.urgent,
            non_urgent_hits = matched.non_urgent,
            "Issue classified"
        );

        ClassifyOutcome::Verdict(classification)
    }

    async fn classify_remote(&self, call_id: &str, text: &str) -> Classification {
        let Some(llm) = &self.llm else {
            tracing::debug!(call_id = %call_id, "No remote classifier configured");
            return self.fallback();
        };

        let history: Vec<Message> = self
            .contexts
            .recent(call_id, self.config.context_turns)
            .into_iter()
            .map(|turn| match turn.role {
                TurnRole::User => Message::user(turn.content),
                TurnRole::Assistant => Message::assistant(turn.content),
            })
            .collect();

        let messages = PromptBuilder::new()
            .classifier_system_prompt(&self.business_name)
            .with_history(&history)
            .user_message(text)
            .build();

        let limit = Duration::from_millis(self.config.remote_timeout_ms);
        let reply = attempt_within(
            "remote_classification",
            limit,
            llm.generate(GenerateRequest::new(messages).json()),
        )
        .await;

        let Some(reply) = reply else {
            return self.fallback();
        };

        let Some(classification) = parse_remote(&reply.text) else {
            tracing::warn!(
                call_id = %call_id,
                model = llm.model_name(),
                "Malformed classifier reply"
            );
            return self.fallback();
        };

        self.contexts.append(call_id, Turn::user(text));
        self.contexts
            .append(call_id, Turn::assistant(classification.response_text.clone()));

        classification
    }

    fn fallback(&self) -> Classification {
        Classification::new(
            Urgency::Urgent,
            self.config.fallback_confidence,
            FALLBACK_ACK,
            VerdictSource::Fallback,
        )
    }
}

fn parse_remote(reply: &str) -> Option<Classification> {
    let value = extract_json_object(reply)?;
    let verdict: RemoteVerdict = serde_json::from_value(value).ok()?;
    let urgency = Urgency::parse_loose(&verdict.urgency)?;

    let response = verdict
        .response
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| match urgency {
            Urgency::Urgent => URGENT_ACK.to_string(),
            Urgency::NotUrgent => NON_URGENT_ACK.to_string(),
        });

    let confidence = verdict.confidence.unwrap_or(0.5).clamp(0.0, 1.0);
    Some(Classification::new(urgency, confidence, response, VerdictSource::Remote))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_rules() {
        let validator = InputValidator::default();
        assert_eq!(validator.validate("   "), Err(InputRejection::Empty));
        assert_eq!(validator.validate("hm"), Err(InputRejection::TooShort));
        assert_eq!(validator.validate(&"a".repeat(501)), Err(InputRejection::TooLong));
        assert!(validator.validate(&"a".repeat(500)).is_ok());
        assert!(validator.validate("my printer is broken").is_ok());
    }

    #[test]
    fn test_noise_only_transcripts() {
        let validator = InputValidator::default();
        for noise in ["yes", "Um, uh...", "hello hello", "Okay thank you", "uhhh hmm", "No."] {
            assert_eq!(validator.validate(noise), Err(InputRejection::Noise), "{:?}", noise);
        }
        assert!(validator.validate("yes the server is down").is_ok());
        assert!(validator.validate("hello, our till is broken").is_ok());
    }

    #[test]
    fn test_keyword_counts() {
        let m =
            KeywordMatch::count("our website is completely down and customers can\u{2019}t pay");
        assert_eq!(m, KeywordMatch { urgent: 2, non_urgent: 0 });
        assert_eq!(m.verdict(), Some(Urgency::Urgent));

        let m = KeywordMatch::count("how do I change my account settings");
        assert_eq!(m.urgent, 0);
        assert!(m.non_urgent >= 3);
        assert_eq!(m.verdict(), Some(Urgency::NotUrgent));
    }

    #[test]
    fn test_ties_have_no_verdict() {
        assert_eq!(KeywordMatch::count("I need to talk to someone about my order").verdict(), None);
        let tie = KeywordMatch::count("the printer is down and I have a question");
        assert_eq!(tie.verdict(), None);
    }

    #[test]
    fn test_parse_remote_reply() {
        let reply =
            r#"Sure: {"urgency": "not urgent", "confidence": 1.7, "response": " We can help. "}"#;
        let c = parse_remote(reply).unwrap();
        assert_eq!(c.urgency, Urgency::NotUrgent);
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.response_text, "We can help.");
        assert_eq!(c.source, VerdictSource::Remote);
        assert!(!c.requires_address);

        let c = parse_remote(r#"{"urgency": "urgent"}"#).unwrap();
        assert!(c.requires_address);
        assert_eq!(c.response_text, URGENT_ACK);

        assert!(parse_remote("I think it's urgent").is_none());
        assert!(parse_remote(r#"{"urgency": "maybe"}"#).is_none());
        assert!(parse_remote(r#"{"confidence": 0.9}"#).is_none());
    }
}
