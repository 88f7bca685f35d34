//! Records emitted by the call flow and the admin surface

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hotline_core::{ReferenceKind, ReferenceNumber};

/// What kind of call completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    UrgentCase,
    Callback,
}

impl CompletionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrgentCase => "urgent_case",
            Self::Callback => "callback",
        }
    }
}

impl From<ReferenceKind> for CompletionKind {
    fn from(kind: ReferenceKind) -> Self {
        match kind {
            ReferenceKind::UrgentCase => Self::UrgentCase,
            ReferenceKind::Callback => Self::Callback,
        }
    }
}

/// A call reached a terminal stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub kind: CompletionKind,
    pub reference_number: ReferenceNumber,
    pub call_id: String,
    pub fields: BTreeMap<String, String>,
    pub completed_at: DateTime<Utc>,
}

impl CompletionEvent {
    pub fn new(
        reference_number: ReferenceNumber,
        call_id: impl Into<String>,
        fields: BTreeMap<String, String>,
    ) -> Self {
        Self {
            kind: reference_number.kind().into(),
            reference_number,
            call_id: call_id.into(),
            fields,
            completed_at: Utc::now(),
        }
    }
}

/// An operator changed a case's status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub reference_number: ReferenceNumber,
    pub status: String,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One line of the completion log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Record {
    Completion(CompletionEvent),
    StatusUpdate(StatusUpdate),
}

impl Record {
    pub fn reference_number(&self) -> &ReferenceNumber {
        match self {
            Record::Completion(e) => &e.reference_number,
            Record::StatusUpdate(u) => &u.reference_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_reference() {
        let reference: ReferenceNumber = "CBK-000111".parse().unwrap();
        let event = CompletionEvent::new(reference, "CA1", BTreeMap::new());
        assert_eq!(event.kind, CompletionKind::Callback);
    }

    #[test]
    fn test_record_tagging() {
        let update = Record::StatusUpdate(StatusUpdate {
            reference_number: "UBG-123456".parse().unwrap(),
            status: "resolved".to_string(),
            notes: None,
            updated_at: Utc::now(),
        });

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["event"], "status_update");
        assert_eq!(json["referenceNumber"], "UBG-123456");
    }
}
