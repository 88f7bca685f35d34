//! Call handling for the business-support hotline
//!
//! Features:
//! - Issue classification (keyword pre-filter, remote model, urgent fallback)
//! - Stage machine for the urgent and callback paths
//! - Session store with TTL eviction
//! - Per-stage handlers that never fail the caller
//! - Read-only case and callback registry for operators

pub mod classifier;
pub mod context;
pub mod flow;
pub mod handlers;
pub mod registry;
pub mod stage;
pub mod store;
pub mod telemetry;

pub use classifier::{
    Classification, ClassifyOutcome, InputRejection, InputValidator, IssueClassifier, KeywordMatch,
    Urgency, VerdictSource,
};
pub use context::ConversationContexts;
pub use flow::{CallEvent, CallFlow, CallFlowConfig, TurnResponse, CLOSED_STAGE};
pub use handlers::{unique_reference, StageHandlers, StageOutcome};
pub use registry::{CaseRegistry, CaseStatus, RegistryError, ScheduledCallback, UrgentCase};
pub use stage::{CallStage, StageTransition};
pub use store::{fields, CallSession, InMemorySessionStore, SessionStore, StoreError};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Core error: {0}")]
    Core(#[from] hotline_core::Error),
}
