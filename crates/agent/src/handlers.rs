//! Per-stage handlers
//!
//! Each handler consumes one speech event for a call in a known stage and
//! returns a [`StageOutcome`]. Handlers may fail on store errors; the flow
//! dispatcher turns a failure into [`StageHandlers::recover`], which always
//! yields a caller-facing response and, for the collecting stages that end a
//! call, a reference number.

use std::sync::Arc;

use chrono::Utc;

use hotline_config::{ClassifierConfig, FlowConfig};
use hotline_core::{ReferenceKind, ReferenceNumber, SpeechInput};

use crate::classifier::{
    Classification, ClassifyOutcome, InputRejection, InputValidator, IssueClassifier, Urgency,
};
use crate::registry::CaseStatus;
use crate::stage::CallStage;
use crate::store::{fields, SessionStore};
use crate::AgentError;

/// Result of handling one speech event
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// Input unusable, stage unchanged
    Reprompt {
        stage: CallStage,
        reason: InputRejection,
        response_text: String,
    },
    /// Too many consecutive re-prompts, call ends
    GaveUp {
        stage: CallStage,
        reason: InputRejection,
        response_text: String,
    },
    Classified {
        classification: Classification,
        next_stage: CallStage,
        response_text: String,
    },
    DetailsRecorded {
        response_text: String,
    },
    UrgentEscalated {
        reference: ReferenceNumber,
        response_window: String,
        response_text: String,
    },
    InquiryAcknowledged {
        response_text: String,
    },
    CallbackScheduled {
        reference: ReferenceNumber,
        callback_time: String,
        response_text: String,
    },
    /// Call already finished, or its stage is not recognised
    Closed {
        reference: Option<ReferenceNumber>,
        response_text: String,
    },
    /// A handler failed and its fallback response was used
    Recovered {
        stage: CallStage,
        reference: Option<ReferenceNumber>,
        prompt_again: bool,
        response_text: String,
    },
}

impl StageOutcome {
    pub fn response_text(&self) -> &str {
        match self {
            StageOutcome::Reprompt { response_text, .. }
            | StageOutcome::GaveUp { response_text, .. }
            | StageOutcome::Classified { response_text, .. }
            | StageOutcome::DetailsRecorded { response_text }
            | StageOutcome::UrgentEscalated { response_text, .. }
            | StageOutcome::InquiryAcknowledged { response_text }
            | StageOutcome::CallbackScheduled { response_text, .. }
            | StageOutcome::Closed { response_text, .. }
            | StageOutcome::Recovered { response_text, .. } => response_text,
        }
    }

    /// Whether the telephony layer should listen for another utterance
    pub fn should_prompt_again(&self) -> bool {
        match self {
            StageOutcome::Reprompt { .. }
            | StageOutcome::Classified { .. }
            | StageOutcome::DetailsRecorded { .. }
            | StageOutcome::InquiryAcknowledged { .. } => true,
            StageOutcome::GaveUp { .. }
            | StageOutcome::UrgentEscalated { .. }
            | StageOutcome::CallbackScheduled { .. }
            | StageOutcome::Closed { .. } => false,
            StageOutcome::Recovered { prompt_again, .. } => *prompt_again,
        }
    }

    pub fn reference(&self) -> Option<&ReferenceNumber> {
        match self {
            StageOutcome::UrgentEscalated { reference, .. }
            | StageOutcome::CallbackScheduled { reference, .. } => Some(reference),
            StageOutcome::Closed { reference, .. } | StageOutcome::Recovered { reference, .. } => {
                reference.as_ref()
            }
            _ => None,
        }
    }

    /// Reference of a call completed by this outcome
    ///
    /// `Closed` repeats an earlier completion and is not included.
    pub fn completed_reference(&self) -> Option<&ReferenceNumber> {
        match self {
            StageOutcome::UrgentEscalated { reference, .. }
            | StageOutcome::CallbackScheduled { reference, .. } => Some(reference),
            StageOutcome::Recovered { reference, .. } => reference.as_ref(),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StageOutcome::Reprompt { .. } => "reprompt",
            StageOutcome::GaveUp { .. } => "gave_up",
            StageOutcome::Classified { .. } => "classified",
            StageOutcome::DetailsRecorded { .. } => "details_recorded",
            StageOutcome::UrgentEscalated { .. } => "urgent_escalated",
            StageOutcome::InquiryAcknowledged { .. } => "inquiry_acknowledged",
            StageOutcome::CallbackScheduled { .. } => "callback_scheduled",
            StageOutcome::Closed { .. } => "closed",
            StageOutcome::Recovered { .. } => "recovered",
        }
    }
}

fn reprompt_text(stage: CallStage) -> &'static str {
    match stage {
        CallStage::Initial => {
            "Sorry, I didn't quite catch that. \
             Could you briefly describe the issue you're calling about?"
        }
        CallStage::UrgentDetails => {
            "Sorry, I didn't get that. Could you describe the problem again?"
        }
        CallStage::CollectAddress => {
            "Sorry, I didn't get the address. Could you say the full business address again?"
        }
        CallStage::ScheduleCallback => {
            "Sorry, I didn't catch that. When would be a good time for us to call you back?"
        }
        _ => "Sorry, could you say that again?",
    }
}

const GAVE_UP_TEXT: &str =
    "I'm sorry, I'm having trouble understanding the line. \
     Please try calling again in a moment. Goodbye.";
const RETRY_TEXT: &str = "I'm sorry, I had trouble with that. Could you say it once more?";
const GOODBYE_TEXT: &str = "Thank you for calling. Goodbye.";

/// Draws allowed before a reference number is accepted regardless
const REFERENCE_ATTEMPTS: u32 = 32;

/// First candidate that no other stored call holds
///
/// `candidate` receives the attempt number, starting at zero.
pub fn unique_reference(
    store: &dyn SessionStore,
    call_id: &str,
    mut candidate: impl FnMut(u32) -> ReferenceNumber,
) -> ReferenceNumber {
    for attempt in 0..REFERENCE_ATTEMPTS {
        let reference = candidate(attempt);
        let holders = store.holders_of(&reference);
        if holders.iter().all(|holder| holder == call_id) {
            return reference;
        }
        tracing::debug!(
            call_id = %call_id,
            reference = %reference,
            "Reference number in use, drawing again"
        );
    }

    let reference = candidate(REFERENCE_ATTEMPTS);
    tracing::warn!(call_id = %call_id, reference = %reference, "No free reference number found");
    reference
}

/// Stage handlers over a session store
pub struct StageHandlers {
    store: Arc<dyn SessionStore>,
    classifier: IssueClassifier,
    validator: InputValidator,
    flow: FlowConfig,
    min_confidence: f32,
    min_chars: usize,
}

impl StageHandlers {
    pub fn new(
        store: Arc<dyn SessionStore>,
        classifier: IssueClassifier,
        flow: FlowConfig,
        classifier_config: &ClassifierConfig,
    ) -> Self {
        Self {
            validator: *classifier.validator(),
            store,
            classifier,
            flow,
            min_confidence: classifier_config.min_recognition_confidence,
            min_chars: classifier_config.min_transcript_chars,
        }
    }

    pub fn greeting_text(&self) -> String {
        format!(
            "Thank you for calling {}. Please briefly describe the issue you're calling about.",
            self.flow.business_name
        )
    }

    /// Classify the caller's issue and pick a path
    pub async fn initial(&self, input: &SpeechInput) -> Result<StageOutcome, AgentError> {
        let call_id = input.call_id.as_str();
        self.store.ensure(call_id)?;

        if input.recognition_confidence < self.min_confidence {
            return self.reprompt(call_id, CallStage::Initial, InputRejection::LowConfidence);
        }
        if input.char_count() < self.min_chars {
            return self.reprompt(call_id, CallStage::Initial, InputRejection::TooShort);
        }

        let classification = match self.classifier.classify(call_id, input.text()).await {
            ClassifyOutcome::NeedsRepeat(reason) => {
                return self.reprompt(call_id, CallStage::Initial, reason);
            }
            ClassifyOutcome::Verdict(c) => c,
        };

        let (next_stage, prompt) = match classification.urgency {
            Urgency::Urgent => (
                CallStage::UrgentDetails,
                "Please describe the problem in as much detail as you can.",
            ),
            Urgency::NotUrgent => (
                CallStage::NonUrgentCallback,
                "Could you tell me a little more about what you need?",
            ),
        };

        self.store.set_field(call_id, fields::ISSUE_SUMMARY, input.text())?;
        self.store
            .set_field(call_id, fields::URGENCY, classification.urgency.as_str())?;
        self.store.advance(call_id, next_stage)?;

        let response_text = format!("{} {}", classification.response_text, prompt);
        Ok(StageOutcome::Classified {
            classification,
            next_stage,
            response_text,
        })
    }

    pub fn urgent_details(&self, input: &SpeechInput) -> Result<StageOutcome, AgentError> {
        let call_id = input.call_id.as_str();
        if let Err(reason) = self.validator.validate(&input.transcript) {
            return self.reprompt(call_id, CallStage::UrgentDetails, reason);
        }

        self.store.set_field(call_id, fields::DETAILED_MESSAGE, input.text())?;
        self.store
            .set_field(call_id, fields::TIMESTAMP, &Utc::now().to_rfc3339())?;
        self.store.advance(call_id, CallStage::CollectAddress)?;

        Ok(StageOutcome::DetailsRecorded {
            response_text: "Thank you. What is the address of the business where this is happening?"
                .to_string(),
        })
    }

    pub fn collect_address(&self, input: &SpeechInput) -> Result<StageOutcome, AgentError> {
        let call_id = input.call_id.as_str();
        if let Err(reason) = self.validator.validate(&input.transcript) {
            return self.reprompt(call_id, CallStage::CollectAddress, reason);
        }

        self.store.set_field(call_id, fields::BUSINESS_ADDRESS, input.text())?;
        let reference = self.issue_reference(call_id, ReferenceKind::UrgentCase);
        self.complete_urgent(call_id, &reference)?;

        let response_window = self.flow.urgent_response_window.clone();
        let response_text = format!(
            "Thank you. Your case has been escalated and a technician will contact you {}. \
             Your reference number is {}. Goodbye.",
            response_window, reference
        );
        Ok(StageOutcome::UrgentEscalated {
            reference,
            response_window,
            response_text,
        })
    }

    pub fn non_urgent_callback(&self, input: &SpeechInput) -> Result<StageOutcome, AgentError> {
        self.store
            .advance(&input.call_id, CallStage::ScheduleCallback)?;

        Ok(StageOutcome::InquiryAcknowledged {
            response_text: "Thanks for explaining. \
                            When would be a good time for us to call you back?"
                .to_string(),
        })
    }

    pub fn schedule_callback(&self, input: &SpeechInput) -> Result<StageOutcome, AgentError> {
        let call_id = input.call_id.as_str();
        if let Err(reason) = self.validator.validate(&input.transcript) {
            return self.reprompt(call_id, CallStage::ScheduleCallback, reason);
        }

        let callback_time = input
            .text()
            .trim_end_matches(['.', '!', '?'])
            .to_string();
        self.store.set_field(call_id, fields::CALLBACK_TIME, &callback_time)?;
        let reference = self.issue_reference(call_id, ReferenceKind::Callback);
        self.complete_callback(call_id, &reference)?;

        let response_text = format!(
            "You're all set, we'll call you back {}. Your reference number is {}. \
             Thank you for calling. Goodbye.",
            callback_time, reference
        );
        Ok(StageOutcome::CallbackScheduled {
            reference,
            callback_time,
            response_text,
        })
    }

    /// Closing response for finished calls; never mutates the session
    pub fn closed(&self, call_id: &str) -> StageOutcome {
        let reference = self
            .store
            .get(call_id)
            .and_then(|session| session.reference_number());

        let response_text = match &reference {
            Some(reference) => format!(
                "Your request is already recorded under reference {}. {}",
                reference, GOODBYE_TEXT
            ),
            None => GOODBYE_TEXT.to_string(),
        };

        StageOutcome::Closed {
            reference,
            response_text,
        }
    }

    /// Fallback response after a handler failed in `stage`
    pub fn recover(&self, call_id: &str, stage: CallStage) -> StageOutcome {
        let kind = match stage {
            CallStage::CollectAddress => ReferenceKind::UrgentCase,
            CallStage::ScheduleCallback => ReferenceKind::Callback,
            CallStage::UrgentComplete | CallStage::CallbackComplete => return self.closed(call_id),
            CallStage::Initial | CallStage::UrgentDetails | CallStage::NonUrgentCallback => {
                return StageOutcome::Recovered {
                    stage,
                    reference: None,
                    prompt_again: true,
                    response_text: RETRY_TEXT.to_string(),
                };
            }
        };

        // Later attempts shift the instant so the number stays deterministic
        let at = Utc::now();
        let reference = unique_reference(self.store.as_ref(), call_id, |attempt| {
            let shifted = at + chrono::Duration::milliseconds(i64::from(attempt));
            ReferenceNumber::fallback(kind, call_id, shifted)
        });
        let stored = match kind {
            ReferenceKind::UrgentCase => self.complete_urgent(call_id, &reference),
            ReferenceKind::Callback => self.complete_callback(call_id, &reference),
        };
        if let Err(e) = stored {
            tracing::warn!(
                call_id = %call_id,
                reference = %reference,
                error = %e,
                "Could not record fallback reference"
            );
        }

        let response_text = match kind {
            ReferenceKind::UrgentCase => format!(
                "I'm sorry, something went wrong on our side, but your case has been escalated. \
                 Your reference number is {}. Goodbye.",
                reference
            ),
            ReferenceKind::Callback => format!(
                "I'm sorry, something went wrong on our side, but we will call you back. \
                 Your reference number is {}. Goodbye.",
                reference
            ),
        };

        StageOutcome::Recovered {
            stage,
            reference: Some(reference),
            prompt_again: false,
            response_text,
        }
    }

    fn issue_reference(&self, call_id: &str, kind: ReferenceKind) -> ReferenceNumber {
        unique_reference(self.store.as_ref(), call_id, |_| ReferenceNumber::generate(kind))
    }

    fn complete_urgent(
        &self,
        call_id: &str,
        reference: &ReferenceNumber,
    ) -> Result<(), AgentError> {
        self.store
            .set_field(call_id, fields::REFERENCE_NUMBER, reference.as_str())?;
        self.store
            .set_field(call_id, fields::STATUS, CaseStatus::UrgentEscalated.as_str())?;
        self.store
            .set_field(call_id, fields::RESPONSE_WINDOW, &self.flow.urgent_response_window)?;
        self.store
            .set_field(call_id, fields::TIMESTAMP, &Utc::now().to_rfc3339())?;
        self.store.advance(call_id, CallStage::UrgentComplete)?;
        Ok(())
    }

    fn complete_callback(
        &self,
        call_id: &str,
        reference: &ReferenceNumber,
    ) -> Result<(), AgentError> {
        self.store
            .set_field(call_id, fields::REFERENCE_NUMBER, reference.as_str())?;
        self.store
            .set_field(call_id, fields::STATUS, CaseStatus::CallbackScheduled.as_str())?;
        self.store
            .set_field(call_id, fields::TIMESTAMP, &Utc::now().to_rfc3339())?;
        self.store.advance(call_id, CallStage::CallbackComplete)?;
        Ok(())
    }

    fn reprompt(
        &self,
        call_id: &str,
        stage: CallStage,
        reason: InputRejection,
    ) -> Result<StageOutcome, AgentError> {
        let count = self.store.record_reprompt(call_id)?;

        if count > self.flow.max_reprompts {
            tracing::info!(
                call_id = %call_id,
                stage = %stage,
                count,
                "Re-prompt limit reached, closing call"
            );
            return Ok(StageOutcome::GaveUp {
                stage,
                reason,
                response_text: GAVE_UP_TEXT.to_string(),
            });
        }

        Ok(StageOutcome::Reprompt {
            stage,
            reason,
            response_text: reprompt_text(stage).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::store::InMemorySessionStore;

    fn reference(value: &str) -> ReferenceNumber {
        value.parse().unwrap()
    }

    #[test]
    fn test_unique_reference_skips_numbers_in_use() {
        let store = InMemorySessionStore::new(Duration::from_secs(60), 10);
        store.set_field("CA1", fields::REFERENCE_NUMBER, "UBG-000001").unwrap();
        store.set_field("CA2", fields::REFERENCE_NUMBER, "UBG-000002").unwrap();

        let candidates = ["UBG-000001", "UBG-000002", "UBG-000003"];
        let issued =
            unique_reference(&store, "CA3", |attempt| reference(candidates[attempt as usize]));
        assert_eq!(issued.as_str(), "UBG-000003");
    }

    #[test]
    fn test_unique_reference_accepts_own_number() {
        let store = InMemorySessionStore::new(Duration::from_secs(60), 10);
        store.set_field("CA1", fields::REFERENCE_NUMBER, "CBK-000007").unwrap();

        let issued = unique_reference(&store, "CA1", |_| reference("CBK-000007"));
        assert_eq!(issued.as_str(), "CBK-000007");
    }

    #[test]
    fn test_unique_reference_gives_up_after_bounded_draws() {
        let store = InMemorySessionStore::new(Duration::from_secs(60), 10);
        store.set_field("CA1", fields::REFERENCE_NUMBER, "UBG-000001").unwrap();

        let mut draws = 0;
        let issued = unique_reference(&store, "CA2", |_| {
            draws += 1;
            reference("UBG-000001")
        });
        assert_eq!(issued.as_str(), "UBG-000001");
        assert_eq!(draws, REFERENCE_ATTEMPTS + 1);
    }
}
