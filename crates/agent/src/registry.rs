//! Case and callback registry
//!
//! Read-only projections over the session store for operators, plus the
//! one write operators may make: a status change on a completed case.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hotline_core::{attempt_within, ReferenceNumber};
use hotline_persistence::{CompletionSink, StatusUpdate};

use crate::stage::CallStage;
use crate::store::{fields, CallSession, SessionStore, StoreError};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown reference number: {0}")]
    UnknownReference(String),

    #[error("Reference number {reference} matches {count} cases")]
    AmbiguousReference { reference: String, count: usize },

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Lifecycle of a completed case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    UrgentEscalated,
    CallbackScheduled,
    InProgress,
    Resolved,
    Closed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::UrgentEscalated => "urgent_escalated",
            CaseStatus::CallbackScheduled => "callback_scheduled",
            CaseStatus::InProgress => "in_progress",
            CaseStatus::Resolved => "resolved",
            CaseStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "urgent_escalated" => Ok(CaseStatus::UrgentEscalated),
            "callback_scheduled" => Ok(CaseStatus::CallbackScheduled),
            "in_progress" => Ok(CaseStatus::InProgress),
            "resolved" => Ok(CaseStatus::Resolved),
            "closed" => Ok(CaseStatus::Closed),
            other => Err(RegistryError::InvalidStatus(other.to_string())),
        }
    }
}

/// Completed urgent case
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgentCase {
    pub reference_number: String,
    pub call_id: String,
    pub status: String,
    pub issue_summary: Option<String>,
    pub detailed_message: Option<String>,
    pub business_address: Option<String>,
    pub caller_number: Option<String>,
    pub response_window: Option<String>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Scheduled callback
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledCallback {
    pub reference_number: String,
    pub call_id: String,
    pub status: String,
    pub issue_summary: Option<String>,
    pub callback_time: Option<String>,
    pub caller_number: Option<String>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

fn owned(session: &CallSession, key: &str) -> Option<String> {
    session.field(key).map(str::to_string)
}

impl From<&CallSession> for UrgentCase {
    fn from(s: &CallSession) -> Self {
        Self {
            reference_number: owned(s, fields::REFERENCE_NUMBER).unwrap_or_default(),
            call_id: s.call_id.clone(),
            status: owned(s, fields::STATUS).unwrap_or_default(),
            issue_summary: owned(s, fields::ISSUE_SUMMARY),
            detailed_message: owned(s, fields::DETAILED_MESSAGE),
            business_address: owned(s, fields::BUSINESS_ADDRESS),
            caller_number: owned(s, fields::CALLER_NUMBER),
            response_window: owned(s, fields::RESPONSE_WINDOW),
            notes: owned(s, fields::NOTES),
            completed_at: s.completed_at,
        }
    }
}

impl From<&CallSession> for ScheduledCallback {
    fn from(s: &CallSession) -> Self {
        Self {
            reference_number: owned(s, fields::REFERENCE_NUMBER).unwrap_or_default(),
            call_id: s.call_id.clone(),
            status: owned(s, fields::STATUS).unwrap_or_default(),
            issue_summary: owned(s, fields::ISSUE_SUMMARY),
            callback_time: owned(s, fields::CALLBACK_TIME),
            caller_number: owned(s, fields::CALLER_NUMBER),
            notes: owned(s, fields::NOTES),
            completed_at: s.completed_at,
        }
    }
}

/// Operator view over completed calls
#[derive(Clone)]
pub struct CaseRegistry {
    store: Arc<dyn SessionStore>,
    sink: Arc<dyn CompletionSink>,
    persist_timeout: Duration,
}

impl CaseRegistry {
    pub fn new(
        store: Arc<dyn SessionStore>,
        sink: Arc<dyn CompletionSink>,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            store,
            sink,
            persist_timeout,
        }
    }

    fn completed(&self, stage: CallStage) -> Vec<CallSession> {
        let mut sessions: Vec<_> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|s| s.stage == stage)
            .collect();
        sessions.sort_by_key(|s| (s.completed_at, s.created_at));
        sessions
    }

    /// Completed urgent cases, oldest completion first
    pub fn list_urgent_cases(&self) -> Vec<UrgentCase> {
        self.completed(CallStage::UrgentComplete)
            .iter()
            .map(UrgentCase::from)
            .collect()
    }

    /// Callbacks still waiting to be made, oldest completion first
    pub fn list_scheduled_callbacks(&self) -> Vec<ScheduledCallback> {
        self.completed(CallStage::CallbackComplete)
            .iter()
            .filter(|s| s.field(fields::STATUS) == Some(CaseStatus::CallbackScheduled.as_str()))
            .map(ScheduledCallback::from)
            .collect()
    }

    /// Change the status of a completed case.
    ///
    /// Unknown references are an error and change nothing.
    pub async fn update_case_status(
        &self,
        reference: &str,
        status: CaseStatus,
        notes: Option<String>,
    ) -> Result<StatusUpdate, RegistryError> {
        let reference: ReferenceNumber = reference
            .parse()
            .map_err(|_| RegistryError::UnknownReference(reference.to_string()))?;

        let mut matches: Vec<CallSession> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|s| s.stage.is_terminal() && s.reference_number().as_ref() == Some(&reference))
            .collect();

        if matches.len() > 1 {
            tracing::warn!(
                reference = %reference,
                count = matches.len(),
                "Reference number shared by several cases"
            );
            return Err(RegistryError::AmbiguousReference {
                reference: reference.to_string(),
                count: matches.len(),
            });
        }
        let session = matches
            .pop()
            .ok_or_else(|| RegistryError::UnknownReference(reference.to_string()))?;

        let updated_at = Utc::now();
        self.store
            .set_field(&session.call_id, fields::STATUS, status.as_str())?;
        if let Some(notes) = &notes {
            self.store.set_field(&session.call_id, fields::NOTES, notes)?;
        }
        self.store
            .set_field(&session.call_id, fields::STATUS_UPDATED_AT, &updated_at.to_rfc3339())?;

        tracing::info!(
            reference = %reference,
            status = %status,
            call_id = %session.call_id,
            "Case status updated"
        );

        let update = StatusUpdate {
            reference_number: reference,
            status: status.as_str().to_string(),
            notes,
            updated_at,
        };
        attempt_within(
            "record_status_update",
            self.persist_timeout,
            self.sink.record_status_update(&update),
        )
        .await;

        Ok(update)
    }
}
