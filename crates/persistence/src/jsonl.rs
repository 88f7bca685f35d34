//! Append-only JSON-lines completion log

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::{CompletionEvent, CompletionSink, PersistenceError, Record, StatusUpdate};

/// One JSON record per line, appended in arrival order
pub struct JsonlCompletionLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlCompletionLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, record: &Record) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        tracing::debug!(
            path = %self.path.display(),
            reference = %record.reference_number(),
            "Appended record"
        );
        Ok(())
    }

    /// Read every record back, skipping lines that fail to parse.
    pub async fn load(&self) -> Result<Vec<Record>, PersistenceError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(line = index + 1, error = %e, "Skipping corrupt log line"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl CompletionSink for JsonlCompletionLog {
    async fn record_completion(&self, event: &CompletionEvent) -> Result<(), PersistenceError> {
        self.append(&Record::Completion(event.clone())).await
    }

    async fn record_status_update(&self, update: &StatusUpdate) -> Result<(), PersistenceError> {
        self.append(&Record::StatusUpdate(update.clone())).await
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_append_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlCompletionLog::new(dir.path().join("nested").join("completions.jsonl"));

        let mut fields = BTreeMap::new();
        fields.insert("businessAddress".to_string(), "12 Harbour Road".to_string());
        let event = CompletionEvent::new("UBG-204815".parse().unwrap(), "CA42", fields);
        log.record_completion(&event).await.unwrap();

        let update = StatusUpdate {
            reference_number: "UBG-204815".parse().unwrap(),
            status: "resolved".to_string(),
            notes: Some("router replaced".to_string()),
            updated_at: chrono::Utc::now(),
        };
        log.record_status_update(&update).await.unwrap();

        let records = log.load().await.unwrap();
        assert_eq!(records.len(), 2);
        match &records[0] {
            Record::Completion(e) => {
                assert_eq!(e.call_id, "CA42");
                assert_eq!(e.fields["businessAddress"], "12 Harbour Road");
            }
            other => panic!("unexpected record {:?}", other),
        }
        assert!(matches!(&records[1], Record::StatusUpdate(u) if u.status == "resolved"));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlCompletionLog::new(dir.path().join("absent.jsonl"));
        assert!(log.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completions.jsonl");
        let log = JsonlCompletionLog::new(&path);

        let event = CompletionEvent::new("CBK-000777".parse().unwrap(), "CA7", BTreeMap::new());
        log.record_completion(&event).await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        tokio::fs::write(&path, format!("{}not json\n", contents))
            .await
            .unwrap();

        assert_eq!(log.load().await.unwrap().len(), 1);
    }
}
