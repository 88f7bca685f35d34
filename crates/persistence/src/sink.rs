//! Completion sink trait and combinators

use std::sync::Arc;

use async_trait::async_trait;

use crate::{CompletionEvent, PersistenceError, StatusUpdate};

/// Destination for completed cases and status changes
#[async_trait]
pub trait CompletionSink: Send + Sync {
    /// Record a call that reached a terminal stage
    async fn record_completion(&self, event: &CompletionEvent) -> Result<(), PersistenceError>;

    /// Record an operator status change
    async fn record_status_update(&self, update: &StatusUpdate) -> Result<(), PersistenceError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Sink used when no storage is configured
pub struct DiscardSink;

#[async_trait]
impl CompletionSink for DiscardSink {
    async fn record_completion(&self, event: &CompletionEvent) -> Result<(), PersistenceError> {
        tracing::debug!(
            reference = %event.reference_number,
            kind = event.kind.as_str(),
            "No completion storage configured"
        );
        Ok(())
    }

    async fn record_status_update(&self, update: &StatusUpdate) -> Result<(), PersistenceError> {
        tracing::debug!(
            reference = %update.reference_number,
            status = %update.status,
            "No completion storage configured"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discard"
    }
}

/// Writes every record to all inner sinks
///
/// Every sink is attempted even when an earlier one fails.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn CompletionSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn CompletionSink>>) -> Self {
        Self { sinks }
    }

    fn collect(
        &self,
        results: Vec<(&'static str, Result<(), PersistenceError>)>,
    ) -> Result<(), PersistenceError> {
        let total = results.len();
        let mut failed = 0;
        let mut first = None;

        for (name, result) in results {
            if let Err(e) = result {
                tracing::warn!(sink = name, error = %e, "Sink write failed");
                failed += 1;
                first.get_or_insert_with(|| format!("{}: {}", name, e));
            }
        }

        match first {
            None => Ok(()),
            Some(first) => Err(PersistenceError::Partial { failed, total, first }),
        }
    }
}

#[async_trait]
impl CompletionSink for FanoutSink {
    async fn record_completion(&self, event: &CompletionEvent) -> Result<(), PersistenceError> {
        let results = futures::future::join_all(
            self.sinks
                .iter()
                .map(|sink| async move { (sink.name(), sink.record_completion(event).await) }),
        )
        .await;
        self.collect(results)
    }

    async fn record_status_update(&self, update: &StatusUpdate) -> Result<(), PersistenceError> {
        let results = futures::future::join_all(
            self.sinks
                .iter()
                .map(|sink| async move { (sink.name(), sink.record_status_update(update).await) }),
        )
        .await;
        self.collect(results)
    }

    fn name(&self) -> &'static str {
        "fanout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CompletionSink for Counting {
        async fn record_completion(
            &self,
            _event: &CompletionEvent,
        ) -> Result<(), PersistenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PersistenceError::Http("unreachable".to_string()));
            }
            Ok(())
        }

        async fn record_status_update(
            &self,
            _update: &StatusUpdate,
        ) -> Result<(), PersistenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_fanout_attempts_every_sink() {
        let failing = Arc::new(Counting { calls: AtomicUsize::new(0), fail: true });
        let healthy = Arc::new(Counting { calls: AtomicUsize::new(0), fail: false });
        let fanout = FanoutSink::new(vec![failing.clone(), healthy.clone()]);

        let event = CompletionEvent::new("UBG-000001".parse().unwrap(), "CA1", BTreeMap::new());
        let result = fanout.record_completion(&event).await;

        assert!(matches!(result, Err(PersistenceError::Partial { failed: 1, total: 2, .. })));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }
}
