//! Best-effort execution helpers
//!
//! Every collaborator outside the call-stage core (remote classifier,
//! completion sinks, speech synthesis) is invoked through these helpers so
//! a failure is logged once and turned into `None` for the caller to
//! substitute its own fallback.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

/// Await `fut`; log and swallow its error.
pub async fn attempt<T, E, Fut>(operation: &str, fut: Fut) -> Option<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(operation, error = %err, "Best-effort operation failed");
            None
        }
    }
}

/// Race `fut` against `limit`.
///
/// The loser is dropped: a result arriving after the deadline is never
/// observed.
pub async fn attempt_within<T, E, Fut>(operation: &str, limit: Duration, fut: Fut) -> Option<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            tracing::warn!(operation, error = %err, "Best-effort operation failed");
            None
        }
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "Best-effort operation timed out"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_attempt_success_and_failure() {
        let ok = attempt("ok", async { Ok::<_, String>(7) }).await;
        assert_eq!(ok, Some(7));

        let failed = attempt("fail", async { Err::<u32, _>("boom".to_string()) }).await;
        assert_eq!(failed, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_within_times_out_and_discards_late_result() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let result = attempt_within("slow", Duration::from_millis(50), async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
            Ok::<_, String>("late")
        })
        .await;

        assert_eq!(result, None);

        // The losing future was dropped and never runs to completion.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_attempt_within_fast_result() {
        let result =
            attempt_within("fast", Duration::from_secs(1), async { Ok::<_, String>(1) }).await;
        assert_eq!(result, Some(1));
    }
}
