//! Call flow dispatcher
//!
//! Routes each speech event to the handler for the call's current stage,
//! turns handler failures into fallback responses, and hands completed calls
//! to the completion sink without waiting on it.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use hotline_config::{ClassifierConfig, FlowConfig, Settings};
use hotline_core::{attempt_within, SpeechInput};
use hotline_llm::LanguageModel;
use hotline_persistence::{CompletionEvent, CompletionSink};

use crate::classifier::{InputRejection, IssueClassifier};
use crate::context::ConversationContexts;
use crate::handlers::{StageHandlers, StageOutcome};
use crate::registry::CaseRegistry;
use crate::stage::CallStage;
use crate::store::{fields, SessionStore, StoreError};
use crate::telemetry;

/// Stage label reported for calls whose stage is not recognised
pub const CLOSED_STAGE: &str = "closed";

/// Call flow configuration
#[derive(Debug, Clone)]
pub struct CallFlowConfig {
    pub classifier: ClassifierConfig,
    pub flow: FlowConfig,
    pub persist_timeout: Duration,
    pub cleanup_interval: Duration,
}

impl CallFlowConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            classifier: settings.classifier.clone(),
            flow: settings.flow.clone(),
            persist_timeout: Duration::from_millis(settings.persistence.timeout_ms),
            cleanup_interval: Duration::from_secs(settings.sessions.cleanup_interval_seconds),
        }
    }
}

impl Default for CallFlowConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Response for one turn
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub response_text: String,
    pub should_prompt_again: bool,
    pub next_stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
}

impl TurnResponse {
    fn from_outcome(outcome: &StageOutcome, next_stage: String) -> Self {
        Self {
            response_text: outcome.response_text().to_string(),
            should_prompt_again: outcome.should_prompt_again(),
            next_stage,
            reference_number: outcome.reference().map(|r| r.to_string()),
        }
    }
}

/// Call flow event
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// Call answered
    Greeted { call_id: String },
    /// Stage changed
    StageChanged { call_id: String, from: CallStage, to: CallStage },
    /// Caller asked to repeat
    Reprompted {
        call_id: String,
        stage: CallStage,
        reason: InputRejection,
    },
    /// A handler failed and its fallback was used
    Recovered { call_id: String, stage: CallStage },
    /// Call reached a terminal stage
    Completed(CompletionEvent),
}

/// Dispatches speech events for all calls
pub struct CallFlow {
    config: CallFlowConfig,
    store: Arc<dyn SessionStore>,
    contexts: Arc<ConversationContexts>,
    handlers: StageHandlers,
    sink: Arc<dyn CompletionSink>,
    event_tx: broadcast::Sender<CallEvent>,
}

impl CallFlow {
    pub fn new(
        config: CallFlowConfig,
        store: Arc<dyn SessionStore>,
        llm: Option<Arc<dyn LanguageModel>>,
        sink: Arc<dyn CompletionSink>,
    ) -> Self {
        let contexts = Arc::new(ConversationContexts::new(config.classifier.max_context_turns));
        let classifier = IssueClassifier::new(
            config.classifier.clone(),
            config.flow.business_name.clone(),
            llm,
            contexts.clone(),
        );
        let handlers =
            StageHandlers::new(store.clone(), classifier, config.flow.clone(), &config.classifier);
        let (event_tx, _) = broadcast::channel(100);

        Self {
            config,
            store,
            contexts,
            handlers,
            sink,
            event_tx,
        }
    }

    /// Subscribe to call events
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.event_tx.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn contexts(&self) -> &Arc<ConversationContexts> {
        &self.contexts
    }

    pub fn registry(&self) -> CaseRegistry {
        CaseRegistry::new(self.store.clone(), self.sink.clone(), self.config.persist_timeout)
    }

    /// Opening prompt for a call; creates the session
    pub fn greet(&self, call_id: &str, caller_number: Option<&str>) -> TurnResponse {
        let stage = match self.store.stage(call_id) {
            Ok(stage) => stage,
            Err(e) => {
                tracing::warn!(call_id = %call_id, error = %e, "Could not read stage for greeting");
                return self.respond(call_id, &self.handlers.closed(call_id));
            }
        };

        if stage.is_terminal() {
            return self.respond(call_id, &self.handlers.closed(call_id));
        }

        if let Err(e) = self.store.ensure(call_id) {
            tracing::warn!(call_id = %call_id, error = %e, "Could not create session");
        }
        self.remember_caller(call_id, caller_number);

        tracing::info!(call_id = %call_id, stage = %stage, "Call answered");
        let _ = self.event_tx.send(CallEvent::Greeted {
            call_id: call_id.to_string(),
        });

        TurnResponse {
            response_text: self.handlers.greeting_text(),
            should_prompt_again: true,
            next_stage: stage.to_string(),
            reference_number: None,
        }
    }

    /// Handle one recognised utterance
    pub async fn handle_speech(&self, input: SpeechInput) -> TurnResponse {
        let call_id = input.call_id.clone();

        let stage = match self.store.stage(&call_id) {
            Ok(stage) => stage,
            Err(StoreError::UnknownStage { stage, .. }) => {
                tracing::warn!(call_id = %call_id, stage = %stage, "Unknown stage, closing call");
                return self.respond(&call_id, &self.handlers.closed(&call_id));
            }
            Err(e) => {
                tracing::error!(call_id = %call_id, error = %e, "Could not read stage");
                return self.respond(&call_id, &self.handlers.recover(&call_id, CallStage::Initial));
            }
        };

        if !stage.is_terminal() {
            self.remember_caller(&call_id, input.caller_number.as_deref());
        }

        tracing::debug!(
            call_id = %call_id,
            stage = %stage,
            confidence = input.recognition_confidence,
            chars = input.char_count(),
            "Speech received"
        );

        let result = match stage {
            CallStage::Initial => self.handlers.initial(&input).await,
            CallStage::UrgentDetails => self.handlers.urgent_details(&input),
            CallStage::CollectAddress => self.handlers.collect_address(&input),
            CallStage::NonUrgentCallback => self.handlers.non_urgent_callback(&input),
            CallStage::ScheduleCallback => self.handlers.schedule_callback(&input),
            CallStage::UrgentComplete | CallStage::CallbackComplete => {
                Ok(self.handlers.closed(&call_id))
            }
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    call_id = %call_id,
                    stage = %stage,
                    error = %e,
                    "Stage handler failed"
                );
                telemetry::record_recovery(stage);
                let _ = self.event_tx.send(CallEvent::Recovered {
                    call_id: call_id.clone(),
                    stage,
                });
                self.handlers.recover(&call_id, stage)
            }
        };

        self.publish(&call_id, stage, &outcome);
        self.respond(&call_id, &outcome)
    }

    fn respond(&self, call_id: &str, outcome: &StageOutcome) -> TurnResponse {
        let next_stage = match self.store.stage(call_id) {
            Ok(stage) => stage.to_string(),
            Err(_) => CLOSED_STAGE.to_string(),
        };
        TurnResponse::from_outcome(outcome, next_stage)
    }

    fn remember_caller(&self, call_id: &str, caller_number: Option<&str>) {
        let Some(number) = caller_number.map(str::trim).filter(|n| !n.is_empty()) else {
            return;
        };
        let known = self
            .store
            .get(call_id)
            .map_or(false, |s| s.field(fields::CALLER_NUMBER).is_some());
        if known {
            return;
        }
        if let Err(e) = self.store.set_field(call_id, fields::CALLER_NUMBER, number) {
            tracing::warn!(call_id = %call_id, error = %e, "Could not store caller number");
        }
    }

    fn publish(&self, call_id: &str, from: CallStage, outcome: &StageOutcome) {
        telemetry::record_turn(outcome.name());

        match outcome {
            StageOutcome::Classified { classification, .. } => {
                telemetry::record_classification(classification.source);
            }
            StageOutcome::Reprompt { stage, reason, .. }
            | StageOutcome::GaveUp { stage, reason, .. } => {
                telemetry::record_reprompt(*stage);
                tracing::info!(
                    call_id = %call_id,
                    stage = %stage,
                    reason = %reason,
                    outcome = outcome.name(),
                    "Re-prompting caller"
                );
                let _ = self.event_tx.send(CallEvent::Reprompted {
                    call_id: call_id.to_string(),
                    stage: *stage,
                    reason: *reason,
                });
            }
            _ => {}
        }

        if let Ok(to) = self.store.stage(call_id) {
            if to != from {
                tracing::info!(
                    call_id = %call_id,
                    from = %from,
                    to = %to,
                    outcome = outcome.name(),
                    "Call advanced"
                );
                let _ = self.event_tx.send(CallEvent::StageChanged {
                    call_id: call_id.to_string(),
                    from,
                    to,
                });
            }
        }

        if let Some(reference) = outcome.completed_reference() {
            let fields = self.store.fields(call_id).unwrap_or_default();
            let event = CompletionEvent::new(reference.clone(), call_id, fields);
            telemetry::record_completion(event.kind);
            let _ = self.event_tx.send(CallEvent::Completed(event.clone()));
            self.persist(event);
        }
    }

    /// Hand a completion to the sink on a background task
    fn persist(&self, event: CompletionEvent) {
        let sink = self.sink.clone();
        let limit = self.config.persist_timeout;

        tokio::spawn(async move {
            let stored =
                attempt_within("record_completion", limit, sink.record_completion(&event)).await;
            if stored.is_some() {
                tracing::info!(
                    reference = %event.reference_number,
                    kind = event.kind.as_str(),
                    sink = sink.name(),
                    "Completion recorded"
                );
            }
        });
    }

    /// Drop idle sessions and the context of every call no longer stored
    pub fn sweep(&self) -> usize {
        let removed = self.store.sweep_expired();
        self.contexts.retain_calls(|call_id| self.store.contains(call_id));
        removed
    }

    /// Start the periodic session sweep
    ///
    /// Returns a sender; send `true` to stop the task.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let flow = Arc::clone(self);
        let period = flow.config.cleanup_interval.max(Duration::from_millis(10));

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(period);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let removed = flow.sweep();
                        telemetry::record_active_sessions(flow.store.len());
                        if removed > 0 {
                            tracing::info!(
                                removed,
                                remaining = flow.store.len(),
                                "Session cleanup removed expired calls"
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}
