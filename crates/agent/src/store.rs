//! Call session store
//!
//! Sessions are keyed by the telephony call id and created implicitly on
//! first write. Idle sessions expire after a TTL; when a new session would
//! exceed the capacity ceiling, expired sessions are swept first and then the
//! least recently active ones are evicted.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;

use hotline_config::SessionConfig;
use hotline_core::ReferenceNumber;

use crate::stage::{CallStage, StageTransition};

/// Names of collected fields
pub mod fields {
    pub const CALLER_NUMBER: &str = "callerNumber";
    pub const ISSUE_SUMMARY: &str = "issueSummary";
    pub const URGENCY: &str = "urgency";
    pub const DETAILED_MESSAGE: &str = "detailedMessage";
    pub const BUSINESS_ADDRESS: &str = "businessAddress";
    pub const CALLBACK_TIME: &str = "callbackTime";
    pub const REFERENCE_NUMBER: &str = "referenceNumber";
    pub const STATUS: &str = "status";
    pub const RESPONSE_WINDOW: &str = "responseWindow";
    pub const TIMESTAMP: &str = "timestamp";
    pub const NOTES: &str = "notes";
    pub const STATUS_UPDATED_AT: &str = "statusUpdatedAt";
}

/// Session store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Unknown stage for call {call_id}: {stage}")]
    UnknownStage { call_id: String, stage: String },

    #[error("Invalid transition for call {call_id}: {from} -> {to}")]
    InvalidTransition {
        call_id: String,
        from: CallStage,
        to: CallStage,
    },

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// State kept for one call
#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: String,
    pub stage: CallStage,
    pub fields: BTreeMap<String, String>,
    /// Consecutive re-prompts in the current stage
    pub reprompt_count: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_activity: Instant,
}

impl CallSession {
    pub fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            stage: CallStage::Initial,
            fields: BTreeMap::new(),
            reprompt_count: 0,
            created_at: Utc::now(),
            completed_at: None,
            last_activity: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_activity.elapsed() > ttl
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn reference_number(&self) -> Option<ReferenceNumber> {
        self.field(fields::REFERENCE_NUMBER)?.parse().ok()
    }
}

/// Storage for call sessions
///
/// Reads of an unknown call id behave as a fresh `Initial` session; writes
/// create the session.
pub trait SessionStore: Send + Sync {
    /// Current stage, `Initial` when the call is unknown
    fn stage(&self, call_id: &str) -> Result<CallStage, StoreError>;

    /// Create the session if absent; returns true when created
    fn ensure(&self, call_id: &str) -> Result<bool, StoreError>;

    /// Move along one edge of the stage graph
    fn advance(&self, call_id: &str, to: CallStage) -> Result<StageTransition, StoreError>;

    fn set_field(&self, call_id: &str, key: &str, value: &str) -> Result<(), StoreError>;

    fn fields(&self, call_id: &str) -> Result<BTreeMap<String, String>, StoreError>;

    /// Count a re-prompt in the current stage; returns the new count
    fn record_reprompt(&self, call_id: &str) -> Result<u32, StoreError>;

    fn get(&self, call_id: &str) -> Option<CallSession>;

    fn contains(&self, call_id: &str) -> bool {
        self.get(call_id).is_some()
    }

    fn snapshot(&self) -> Vec<CallSession>;

    /// Call ids whose session holds `reference`
    fn holders_of(&self, reference: &ReferenceNumber) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter(|s| s.field(fields::REFERENCE_NUMBER) == Some(reference.as_str()))
            .map(|s| s.call_id)
            .collect()
    }

    fn remove(&self, call_id: &str) -> Option<CallSession>;

    /// Drop idle sessions; returns how many were removed
    fn sweep_expired(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process session store
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, CallSession>>,
    ttl: Duration,
    max_sessions: usize,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_seconds), config.max_sessions)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Make room for one more session
    fn reserve_slot(&self, sessions: &mut HashMap<String, CallSession>) {
        if sessions.len() < self.max_sessions {
            return;
        }

        let ttl = self.ttl;
        sessions.retain(|_, s| !s.is_expired(ttl));

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .values()
                .min_by_key(|s| s.last_activity)
                .map(|s| s.call_id.clone());

            match oldest {
                Some(call_id) => {
                    tracing::warn!(
                        call_id = %call_id,
                        "Session capacity reached, evicting least recently active call"
                    );
                    sessions.remove(&call_id);
                }
                None => break,
            }
        }
    }

    /// Run `f` on the session, creating it first when absent
    fn with_session<T>(&self, call_id: &str, f: impl FnOnce(&mut CallSession) -> T) -> (T, bool) {
        let mut sessions = self.sessions.write();

        let created = !sessions.contains_key(call_id);
        if created {
            self.reserve_slot(&mut sessions);
            tracing::debug!(call_id = %call_id, "Created call session");
        }

        let session = sessions
            .entry(call_id.to_string())
            .or_insert_with(|| CallSession::new(call_id));
        session.touch();
        (f(session), created)
    }
}

impl SessionStore for InMemorySessionStore {
    fn stage(&self, call_id: &str) -> Result<CallStage, StoreError> {
        Ok(self
            .sessions
            .read()
            .get(call_id)
            .map(|s| s.stage)
            .unwrap_or_default())
    }

    fn ensure(&self, call_id: &str) -> Result<bool, StoreError> {
        let ((), created) = self.with_session(call_id, |_| ());
        Ok(created)
    }

    fn advance(&self, call_id: &str, to: CallStage) -> Result<StageTransition, StoreError> {
        self.with_session(call_id, |session| {
            let from = session.stage;
            if !from.can_transition_to(to) {
                return Err(StoreError::InvalidTransition {
                    call_id: call_id.to_string(),
                    from,
                    to,
                });
            }

            let at = Utc::now();
            session.stage = to;
            session.reprompt_count = 0;
            if to.is_terminal() {
                session.completed_at = Some(at);
            }

            tracing::debug!(call_id = %call_id, from = %from, to = %to, "Stage advanced");
            Ok(StageTransition {
                call_id: call_id.to_string(),
                from,
                to,
                at,
            })
        })
        .0
    }

    fn set_field(&self, call_id: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.with_session(call_id, |session| {
            session.fields.insert(key.to_string(), value.to_string());
        });
        Ok(())
    }

    fn fields(&self, call_id: &str) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self
            .sessions
            .read()
            .get(call_id)
            .map(|s| s.fields.clone())
            .unwrap_or_default())
    }

    fn record_reprompt(&self, call_id: &str) -> Result<u32, StoreError> {
        let (count, _) = self.with_session(call_id, |session| {
            session.reprompt_count += 1;
            session.reprompt_count
        });
        Ok(count)
    }

    fn get(&self, call_id: &str) -> Option<CallSession> {
        self.sessions.read().get(call_id).cloned()
    }

    fn snapshot(&self) -> Vec<CallSession> {
        self.sessions.read().values().cloned().collect()
    }

    fn holders_of(&self, reference: &ReferenceNumber) -> Vec<String> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.field(fields::REFERENCE_NUMBER) == Some(reference.as_str()))
            .map(|s| s.call_id.clone())
            .collect()
    }

    fn remove(&self, call_id: &str) -> Option<CallSession> {
        self.sessions.write().remove(call_id)
    }

    fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        let ttl = self.ttl;
        sessions.retain(|_, s| !s.is_expired(ttl));
        before - sessions.len()
    }

    fn len(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemorySessionStore {
        InMemorySessionStore::new(Duration::from_secs(3600), 100)
    }

    #[test]
    fn test_unknown_call_reads_as_initial_without_creating() {
        let store = store();
        assert_eq!(store.stage("CA1").unwrap(), CallStage::Initial);
        assert!(store.fields("CA1").unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_writes_create_session() {
        let store = store();
        store.set_field("CA1", fields::CALLER_NUMBER, "+15550100").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.fields("CA1").unwrap()[fields::CALLER_NUMBER], "+15550100");

        assert!(!store.ensure("CA1").unwrap());
        assert!(store.ensure("CA2").unwrap());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_advance_follows_graph() {
        let store = store();
        store.advance("CA1", CallStage::UrgentDetails).unwrap();
        store.advance("CA1", CallStage::CollectAddress).unwrap();

        let err = store.advance("CA1", CallStage::CallbackComplete).unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidTransition {
                call_id: "CA1".to_string(),
                from: CallStage::CollectAddress,
                to: CallStage::CallbackComplete,
            }
        );
        assert_eq!(store.stage("CA1").unwrap(), CallStage::CollectAddress);

        let transition = store.advance("CA1", CallStage::UrgentComplete).unwrap();
        assert_eq!(transition.from, CallStage::CollectAddress);
        assert!(store.get("CA1").unwrap().completed_at.is_some());
        assert!(store.advance("CA1", CallStage::UrgentComplete).is_err());
    }

    #[test]
    fn test_reprompt_counter_resets_on_advance() {
        let store = store();
        assert_eq!(store.record_reprompt("CA1").unwrap(), 1);
        assert_eq!(store.record_reprompt("CA1").unwrap(), 2);
        store.advance("CA1", CallStage::NonUrgentCallback).unwrap();
        assert_eq!(store.get("CA1").unwrap().reprompt_count, 0);
        assert_eq!(store.record_reprompt("CA1").unwrap(), 1);
    }

    #[test]
    fn test_idle_sessions_expire() {
        let store = InMemorySessionStore::new(Duration::from_millis(20), 100);
        store.ensure("CA1").unwrap();
        std::thread::sleep(Duration::from_millis(40));
        store.ensure("CA2").unwrap();

        assert_eq!(store.sweep_expired(), 1);
        assert!(!store.contains("CA1"));
        assert!(store.contains("CA2"));
    }

    #[test]
    fn test_capacity_evicts_least_recently_active() {
        let store = InMemorySessionStore::new(Duration::from_secs(3600), 2);
        store.ensure("CA1").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        store.ensure("CA2").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        store.set_field("CA1", fields::NOTES, "active again").unwrap();
        std::thread::sleep(Duration::from_millis(5));

        store.ensure("CA3").unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.contains("CA1"));
        assert!(!store.contains("CA2"));
        assert!(store.contains("CA3"));
    }

    #[test]
    fn test_holders_of_reference() {
        let store = store();
        store.set_field("CA1", fields::REFERENCE_NUMBER, "UBG-000042").unwrap();
        store.set_field("CA2", fields::REFERENCE_NUMBER, "CBK-000042").unwrap();
        store.ensure("CA3").unwrap();

        let reference: ReferenceNumber = "UBG-000042".parse().unwrap();
        assert_eq!(store.holders_of(&reference), ["CA1"]);

        let unused: ReferenceNumber = "UBG-000043".parse().unwrap();
        assert!(store.holders_of(&unused).is_empty());
    }

    #[test]
    fn test_reference_number_accessor() {
        let store = store();
        store.set_field("CA1", fields::REFERENCE_NUMBER, "CBK-000042").unwrap();
        let session = store.get("CA1").unwrap();
        assert_eq!(session.reference_number().unwrap().as_str(), "CBK-000042");
    }
}
