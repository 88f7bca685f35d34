//! Spreadsheet webhook sink
//!
//! Posts one flat JSON row per record, the shape accepted by common
//! spreadsheet automation webhooks.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::{CompletionEvent, CompletionSink, PersistenceError, StatusUpdate};

pub struct SheetWebhookSink {
    client: reqwest::Client,
    url: String,
}

impl SheetWebhookSink {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Result<Self, PersistenceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self { client, url: url.into() })
    }

    /// Flatten a completion into a single row
    pub fn completion_row(event: &CompletionEvent) -> Value {
        let mut row = Map::new();
        row.insert("event".to_string(), json!("completion"));
        row.insert("kind".to_string(), json!(event.kind.as_str()));
        row.insert("referenceNumber".to_string(), json!(event.reference_number.as_str()));
        row.insert("callId".to_string(), json!(event.call_id));
        row.insert("completedAt".to_string(), json!(event.completed_at.to_rfc3339()));
        for (key, value) in &event.fields {
            row.entry(key.clone()).or_insert_with(|| json!(value));
        }
        Value::Object(row)
    }

    pub fn status_row(update: &StatusUpdate) -> Value {
        json!({
            "event": "status_update",
            "referenceNumber": update.reference_number.as_str(),
            "status": update.status,
            "notes": update.notes,
            "updatedAt": update.updated_at.to_rfc3339(),
        })
    }

    async fn post(&self, row: &Value) -> Result<(), PersistenceError> {
        let response = self.client.post(&self.url).json(row).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[async_trait]
impl CompletionSink for SheetWebhookSink {
    async fn record_completion(&self, event: &CompletionEvent) -> Result<(), PersistenceError> {
        self.post(&Self::completion_row(event)).await
    }

    async fn record_status_update(&self, update: &StatusUpdate) -> Result<(), PersistenceError> {
        self.post(&Self::status_row(update)).await
    }

    fn name(&self) -> &'static str {
        "sheet_webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_completion_row_is_flat() {
        let mut fields = BTreeMap::new();
        fields.insert("callbackTime".to_string(), "tomorrow morning".to_string());
        fields.insert("callId".to_string(), "spoofed".to_string());
        let event = CompletionEvent::new("CBK-123456".parse().unwrap(), "CA9", fields);

        let row = SheetWebhookSink::completion_row(&event);
        assert_eq!(row["kind"], "callback");
        assert_eq!(row["referenceNumber"], "CBK-123456");
        assert_eq!(row["callbackTime"], "tomorrow morning");
        assert_eq!(row["callId"], "CA9");
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_error() {
        let sink = SheetWebhookSink::new("http://127.0.0.1:9/hook", 500).unwrap();
        let event = CompletionEvent::new("UBG-000001".parse().unwrap(), "CA1", BTreeMap::new());
        assert!(matches!(
            sink.record_completion(&event).await,
            Err(PersistenceError::Http(_))
        ));
    }
}
