//! Persistence boundary for delivered payloads.
//!
//! The ingestion core hands every delivered message to a [`Sink`] and never
//! interprets the bytes itself. [`JsonlSink`] is the collaborator wired up
//! by the binary: one JSON line per payload, appended to a local file.

use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::types::{Result, StreamError};

/// Durable store for delivered payloads.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Persist one delivered logical message.
    async fn save(&self, payload: Vec<u8>) -> Result<()>;
}

/// One persisted payload, as written to the JSONL file.
#[derive(Debug, Serialize)]
struct SinkRecord {
    received_at: DateTime<Utc>,
    bytes: usize,
    payload: String,
}

/// Appends delivered payloads to a JSONL file, one record per message.
///
/// Payload bytes are base64-encoded; the record also carries the receive
/// timestamp and the raw length.
pub struct JsonlSink {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlSink {
    /// Open (or create) the sink file in append mode.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for JsonlSink {
    async fn save(&self, payload: Vec<u8>) -> Result<()> {
        let record = SinkRecord {
            received_at: Utc::now(),
            bytes: payload.len(),
            payload: BASE64_STANDARD.encode(&payload),
        };
        let line = serde_json::to_string(&record)
            .map_err(|e| StreamError::Sink(format!("failed to serialize record: {e}")))?;

        let mut writer = self.writer.lock().await;
        writeln!(writer, "{}", line)
            .map_err(|e| StreamError::Sink(format!("failed to write record: {e}")))?;
        // Flush per message for durability.
        writer
            .flush()
            .map_err(|e| StreamError::Sink(format!("failed to flush sink: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn writes_one_json_line_per_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine-data.jsonl");
        let sink = JsonlSink::create(&path).unwrap();

        assert_ok!(sink.save(vec![1, 2, 3, 4]).await);
        assert_ok!(sink.save(b"hello".to_vec()).await);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["bytes"], 4);
        assert_eq!(first["payload"], BASE64_STANDARD.encode([1, 2, 3, 4]));

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["bytes"], 5);
        assert_eq!(second["payload"], BASE64_STANDARD.encode(b"hello"));
    }

    #[tokio::test]
    async fn appends_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine-data.jsonl");

        {
            let sink = JsonlSink::create(&path).unwrap();
            assert_ok!(sink.save(vec![1]).await);
        }
        {
            let sink = JsonlSink::create(&path).unwrap();
            assert_ok!(sink.save(vec![2]).await);
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
