//! Call stages
//!
//! Two linear paths leave `Initial`: the urgent path collects a description
//! and the business address, the callback path collects a preferred time.
//! Both end in a terminal stage that only ever produces a closing response.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hotline_core::Error;

/// Call stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallStage {
    /// Waiting for the caller to describe the issue
    #[default]
    Initial,
    /// Urgent issue, collecting a detailed description
    UrgentDetails,
    /// Urgent issue, collecting the business address
    CollectAddress,
    /// Non-urgent issue, acknowledging the inquiry
    NonUrgentCallback,
    /// Non-urgent issue, collecting a callback window
    ScheduleCallback,
    /// Urgent case escalated
    UrgentComplete,
    /// Callback scheduled
    CallbackComplete,
}

impl CallStage {
    pub const ALL: [CallStage; 7] = [
        CallStage::Initial,
        CallStage::UrgentDetails,
        CallStage::CollectAddress,
        CallStage::NonUrgentCallback,
        CallStage::ScheduleCallback,
        CallStage::UrgentComplete,
        CallStage::CallbackComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStage::Initial => "initial",
            CallStage::UrgentDetails => "urgent_details",
            CallStage::CollectAddress => "collect_address",
            CallStage::NonUrgentCallback => "non_urgent_callback",
            CallStage::ScheduleCallback => "schedule_callback",
            CallStage::UrgentComplete => "urgent_complete",
            CallStage::CallbackComplete => "callback_complete",
        }
    }

    /// Get all valid transitions from this stage
    pub fn valid_transitions(&self) -> &'static [CallStage] {
        match self {
            CallStage::Initial => &[CallStage::UrgentDetails, CallStage::NonUrgentCallback],
            CallStage::UrgentDetails => &[CallStage::CollectAddress],
            CallStage::CollectAddress => &[CallStage::UrgentComplete],
            CallStage::NonUrgentCallback => &[CallStage::ScheduleCallback],
            CallStage::ScheduleCallback => &[CallStage::CallbackComplete],
            CallStage::UrgentComplete | CallStage::CallbackComplete => &[],
        }
    }

    pub fn can_transition_to(&self, target: CallStage) -> bool {
        self.valid_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStage::UrgentComplete | CallStage::CallbackComplete)
    }

    /// Position along its path, used to check that stages only move forward
    pub fn depth(&self) -> u8 {
        match self {
            CallStage::Initial => 0,
            CallStage::UrgentDetails | CallStage::NonUrgentCallback => 1,
            CallStage::CollectAddress | CallStage::ScheduleCallback => 2,
            CallStage::UrgentComplete | CallStage::CallbackComplete => 3,
        }
    }
}

impl fmt::Display for CallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CallStage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| Error::UnknownStage(s.to_string()))
    }
}

/// A recorded stage change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTransition {
    pub call_id: String,
    pub from: CallStage,
    pub to: CallStage,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_only_move_forward() {
        for stage in CallStage::ALL {
            for next in stage.valid_transitions() {
                assert_eq!(next.depth(), stage.depth() + 1, "{} -> {}", stage, next);
            }
        }
    }

    #[test]
    fn test_terminal_stages_have_no_exits() {
        assert!(CallStage::UrgentComplete.is_terminal());
        assert!(CallStage::CallbackComplete.is_terminal());
        assert!(CallStage::UrgentComplete.valid_transitions().is_empty());
        assert!(!CallStage::Initial.is_terminal());
    }

    #[test]
    fn test_paths_do_not_cross() {
        assert!(CallStage::Initial.can_transition_to(CallStage::UrgentDetails));
        assert!(!CallStage::UrgentDetails.can_transition_to(CallStage::ScheduleCallback));
        assert!(!CallStage::NonUrgentCallback.can_transition_to(CallStage::CollectAddress));
        assert!(!CallStage::CollectAddress.can_transition_to(CallStage::Initial));
    }

    #[test]
    fn test_parse_round_trip_and_unknown() {
        for stage in CallStage::ALL {
            assert_eq!(stage.as_str().parse::<CallStage>().unwrap(), stage);
        }
        assert!(matches!(
            "escalated".parse::<CallStage>(),
            Err(Error::UnknownStage(s)) if s == "escalated"
        ));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&CallStage::NonUrgentCallback).unwrap();
        assert_eq!(json, "\"non_urgent_callback\"");
    }
}
