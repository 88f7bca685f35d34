//! Short-term conversation memory for the remote classifier

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use hotline_core::Turn;

/// Per-call turn history, bounded to `max_turns` per call
pub struct ConversationContexts {
    turns: RwLock<HashMap<String, VecDeque<Turn>>>,
    max_turns: usize,
}

impl ConversationContexts {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: RwLock::new(HashMap::new()),
            max_turns: max_turns.max(1),
        }
    }

    pub fn append(&self, call_id: &str, turn: Turn) {
        let mut turns = self.turns.write();
        let history = turns.entry(call_id.to_string()).or_default();
        history.push_back(turn);
        while history.len() > self.max_turns {
            history.pop_front();
        }
    }

    /// The last `n` turns, oldest first
    pub fn recent(&self, call_id: &str, n: usize) -> Vec<Turn> {
        self.turns
            .read()
            .get(call_id)
            .map(|history| {
                let skip = history.len().saturating_sub(n);
                history.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, call_id: &str) -> usize {
        self.turns.read().get(call_id).map_or(0, VecDeque::len)
    }

    pub fn remove(&self, call_id: &str) {
        self.turns.write().remove(call_id);
    }

    /// Keep only histories whose call is still live
    pub fn retain_calls(&self, mut live: impl FnMut(&str) -> bool) -> usize {
        let mut turns = self.turns.write();
        let before = turns.len();
        turns.retain(|call_id, _| live(call_id));
        before - turns.len()
    }

    pub fn call_count(&self) -> usize {
        self.turns.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotline_core::TurnRole;

    #[test]
    fn test_history_is_bounded() {
        let contexts = ConversationContexts::new(4);
        for i in 0..6 {
            contexts.append("CA1", Turn::user(format!("turn {}", i)));
        }

        assert_eq!(contexts.len("CA1"), 4);
        let recent = contexts.recent("CA1", 3);
        let texts: Vec<_> = recent.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(texts, ["turn 3", "turn 4", "turn 5"]);
    }

    #[test]
    fn test_recent_on_unknown_call() {
        let contexts = ConversationContexts::new(20);
        assert!(contexts.recent("missing", 3).is_empty());
    }

    #[test]
    fn test_retain_calls() {
        let contexts = ConversationContexts::new(20);
        contexts.append("CA1", Turn::user("hello there"));
        contexts.append("CA2", Turn::assistant("how can I help"));

        let dropped = contexts.retain_calls(|id| id == "CA2");
        assert_eq!(dropped, 1);
        assert_eq!(contexts.call_count(), 1);
        assert_eq!(contexts.recent("CA2", 3)[0].role, TurnRole::Assistant);
    }
}
