//! Call flow counters
//!
//! Recorded through the `metrics` facade; nothing is kept unless the binary
//! installs a recorder.

use metrics::{counter, gauge};

use crate::classifier::VerdictSource;
use crate::stage::CallStage;
use hotline_persistence::CompletionKind;

/// Record the outcome of one handled utterance
pub fn record_turn(outcome: &'static str) {
    counter!("hotline_turns_total", "outcome" => outcome).increment(1);
}

/// Record where a classification verdict came from
pub fn record_classification(source: VerdictSource) {
    counter!("hotline_classifications_total", "source" => source.as_str()).increment(1);
}

/// Record a re-prompt in `stage`
pub fn record_reprompt(stage: CallStage) {
    counter!("hotline_reprompts_total", "stage" => stage.as_str()).increment(1);
}

/// Record a call reaching a terminal stage
pub fn record_completion(kind: CompletionKind) {
    counter!("hotline_completions_total", "kind" => kind.as_str()).increment(1);
}

/// Record a handler failure answered with a fallback
pub fn record_recovery(stage: CallStage) {
    counter!("hotline_recoveries_total", "stage" => stage.as_str()).increment(1);
}

/// Record stored session count
pub fn record_active_sessions(count: usize) {
    gauge!("hotline_sessions_active").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_without_recorder() {
        record_turn("classified");
        record_classification(VerdictSource::Keyword);
        record_reprompt(CallStage::Initial);
        record_completion(CompletionKind::Callback);
        record_recovery(CallStage::CollectAddress);
        record_active_sessions(3);
    }
}
