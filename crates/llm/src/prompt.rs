//! Prompt Building and Management
//!
//! Constructs prompts for the issue classifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Prompt builder for the support-line classifier
#[derive(Default)]
pub struct PromptBuilder {
    messages: Vec<Message>,
}

impl PromptBuilder {
    /// Create a new prompt builder
    pub fn new() -> Self {
        Self::default()
    }

    /// System instruction for urgency classification
    pub fn classifier_system_prompt(mut self, business_name: &str) -> Self {
        let system = format!(
            "You answer the phone for a {business} hotline. \
             Decide whether the caller's issue is URGENT (business is down, customers cannot pay, \
             security incident, data loss, anything costing money right now) or NOT URGENT \
             (questions, account changes, billing enquiries, general help).\n\n\
             Reply with a single JSON object and nothing else:\n\
             {{\"urgency\": \"urgent\" | \"not_urgent\", \
             \"confidence\": <number between 0 and 1>, \
             \"response\": \"<one short spoken sentence acknowledging the issue>\"}}\n\n\
             The response is read aloud on a phone call: no markdown, no lists, \
             at most two sentences. When unsure, choose \"urgent\".",
            business = business_name,
        );

        self.messages.push(Message::system(system));
        self
    }

    /// Add conversation history
    pub fn with_history(mut self, history: &[Message]) -> Self {
        self.messages.extend(history.iter().cloned());
        self
    }

    /// Add current user message
    pub fn user_message(mut self, message: &str) -> Self {
        self.messages.push(Message::user(message));
        self
    }

    /// Build final message list
    pub fn build(self) -> Vec<Message> {
        self.messages
    }
}

/// Pull the outermost JSON object out of a model reply.
///
/// Models wrap JSON in code fences or prose often enough that a strict
/// parse of the whole reply is not useful.
pub fn extract_json_object(response: &str) -> Option<serde_json::Value> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }

    let value: serde_json::Value = serde_json::from_str(&response[start..=end]).ok()?;
    value.is_object().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_builder() {
        let history = vec![
            Message::user("hi, I have a problem"),
            Message::assistant("Tell me more."),
        ];
        let messages = PromptBuilder::new()
            .classifier_system_prompt("Acme")
            .with_history(&history)
            .user_message("the card reader is broken")
            .build();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Acme"));
        assert!(messages[0].content.contains("\"urgency\""));
        assert_eq!(messages[3].role, Role::User);
        assert_eq!(messages[3].content, "the card reader is broken");
    }

    #[test]
    fn test_extract_json_object() {
        let fenced = "```json\n\
                      {\"urgency\": \"urgent\", \"confidence\": 0.9, \"response\": \"On it.\"}\n\
                      ```";
        let value = extract_json_object(fenced).unwrap();
        assert_eq!(value["urgency"], "urgent");

        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
        assert!(extract_json_object("{not valid json}").is_none());
        assert!(extract_json_object("[1, 2]").is_none());
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Message::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}
