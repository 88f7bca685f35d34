//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;
use std::time::Duration;

use hotline_agent::{CallFlow, CallFlowConfig, CaseRegistry, InMemorySessionStore, SessionStore};
use hotline_config::Settings;
use hotline_llm::{ChatCompletionsBackend, HttpSpeechSynthesizer, LanguageModel, SpeechSynthesizer};
use hotline_persistence::build_sink;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::audio::VoicePrompter;
use crate::ServerError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: Arc<Settings>,
    /// Call flow dispatcher
    pub flow: Arc<CallFlow>,
    /// Operator view over completed calls
    pub registry: CaseRegistry,
    /// Prompt audio
    pub voice: Arc<VoicePrompter>,
    /// Prometheus rendering, absent when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire every component from configuration
    pub fn new(config: Settings) -> Result<Self, ServerError> {
        let store: Arc<dyn SessionStore> =
            Arc::new(InMemorySessionStore::from_config(&config.sessions));

        let llm: Option<Arc<dyn LanguageModel>> = if config.llm.enabled {
            let timeout = Duration::from_millis(config.classifier.remote_timeout_ms);
            let backend = ChatCompletionsBackend::new(config.llm.clone(), timeout)?;
            tracing::info!(model = backend.model_name(), "Remote classifier enabled");
            Some(Arc::new(backend))
        } else {
            tracing::info!("Remote classifier disabled, ties default to urgent");
            None
        };

        let synthesizer: Option<Arc<dyn SpeechSynthesizer>> = if config.speech.enabled {
            match HttpSpeechSynthesizer::new(config.speech.clone()) {
                Ok(synth) => Some(Arc::new(synth)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Speech synthesis unavailable, prompts will be spoken by the provider"
                    );
                    None
                }
            }
        } else {
            None
        };

        let sink = build_sink(&config.persistence)?;
        let flow = CallFlow::new(CallFlowConfig::from_settings(&config), store, llm, sink);

        Ok(Self::from_parts(config, flow, synthesizer))
    }

    /// Assemble state around an existing flow
    pub fn from_parts(
        config: Settings,
        flow: CallFlow,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        let voice = VoicePrompter::new(synthesizer, &config.speech);
        Self {
            registry: flow.registry(),
            flow: Arc::new(flow),
            voice: Arc::new(voice),
            config: Arc::new(config),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
