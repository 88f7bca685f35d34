//! Completion persistence for the hotline IVR
//!
//! Provides durable storage for:
//! - Completed urgent cases and scheduled callbacks
//! - Admin status updates
//!
//! Storage is best-effort from the call flow's point of view: every sink
//! call is wrapped by the caller and a failure never reaches the caller on
//! the phone.

pub mod error;
pub mod events;
pub mod jsonl;
pub mod sheet;
pub mod sink;

pub use error::PersistenceError;
pub use events::{CompletionEvent, CompletionKind, Record, StatusUpdate};
pub use jsonl::JsonlCompletionLog;
pub use sheet::SheetWebhookSink;
pub use sink::{CompletionSink, DiscardSink, FanoutSink};

use std::sync::Arc;

use hotline_config::PersistenceConfig;

/// Build the sink described by configuration.
///
/// Both destinations may be configured at once; with neither, completions
/// are only logged.
pub fn build_sink(config: &PersistenceConfig) -> Result<Arc<dyn CompletionSink>, PersistenceError> {
    let mut sinks: Vec<Arc<dyn CompletionSink>> = Vec::new();

    if let Some(path) = &config.jsonl_path {
        tracing::info!(path = %path, "Completion log enabled");
        sinks.push(Arc::new(JsonlCompletionLog::new(path)));
    }

    if let Some(url) = &config.sheet_webhook_url {
        tracing::info!("Sheet webhook enabled");
        sinks.push(Arc::new(SheetWebhookSink::new(url, config.timeout_ms)?));
    }

    Ok(match sinks.len() {
        0 => Arc::new(DiscardSink),
        1 => sinks.remove(0),
        _ => Arc::new(FanoutSink::new(sinks)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_sink_variants() {
        let none = build_sink(&PersistenceConfig::default()).unwrap();
        assert_eq!(none.name(), "discard");

        let file = build_sink(&PersistenceConfig {
            jsonl_path: Some("/tmp/hotline-test.jsonl".to_string()),
            ..PersistenceConfig::default()
        })
        .unwrap();
        assert_eq!(file.name(), "jsonl");

        let both = build_sink(&PersistenceConfig {
            jsonl_path: Some("/tmp/hotline-test.jsonl".to_string()),
            sheet_webhook_url: Some("https://sheets.example.com/hook".to_string()),
            ..PersistenceConfig::default()
        })
        .unwrap();
        assert_eq!(both.name(), "fanout");
    }
}
