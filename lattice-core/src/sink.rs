//! Append-only line-delimited record sink. The persistence plumbing
//! itself (rotation, compaction, querying) is an external collaborator
//! per spec §1; this crate only defines the narrow interface the probe
//! engine and analyzer share, plus one concrete JSONL-file
//! implementation good enough to drive the rest of the core.

use crate::error::Result;
use crate::types::BurstRecord;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Append-only record sink. Implementations must serialize concurrent
/// writers (spec §5: "one writer at a time... line-atomically").
#[async_trait::async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, record: &BurstRecord) -> Result<()>;
    async fn flush(&self) -> Result<()>;
}

/// A [`RecordSink`] backed by a JSONL file, opened in append mode.
/// Writes are serialized behind a mutex so records from concurrent probe
/// tasks interleave at record granularity and never mid-record.
pub struct JsonlFileSink {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl JsonlFileSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl RecordSink for JsonlFileSink {
    async fn append(&self, record: &BurstRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let mut file = self.file.lock().await;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InterfaceClass;

    fn sample_record(endpoint_id: &str) -> BurstRecord {
        BurstRecord {
            ts_ms: 0,
            endpoint_id: endpoint_id.to_string(),
            host: "localhost".to_string(),
            port: 9000,
            region_hint: None,
            samples_ms: vec![1.0, 2.0, 3.0],
            min_ms: Some(1.0),
            p05_ms: Some(1.0),
            median_ms: Some(2.0),
            interface_class: InterfaceClass::Loopback,
            tunnel_present: false,
            tunnel_active: false,
            tunnel_interfaces: Vec::new(),
            local_addr: None,
            destination_is_loopback: true,
            claimed_egress_region: None,
            notes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn appends_are_line_delimited_and_atomic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.jsonl");
        let sink = JsonlFileSink::open(&path).expect("open");

        sink.append(&sample_record("a")).await.expect("append a");
        sink.append(&sample_record("b")).await.expect("append b");
        sink.flush().await.expect("flush");

        let content = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: BurstRecord = serde_json::from_str(lines[0]).expect("parse");
        assert_eq!(first.endpoint_id, "a");
    }

    #[tokio::test]
    async fn reopening_an_existing_file_appends_rather_than_truncates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.jsonl");
        {
            let sink = JsonlFileSink::open(&path).expect("open");
            sink.append(&sample_record("a")).await.expect("append");
        }
        {
            let sink = JsonlFileSink::open(&path).expect("reopen");
            sink.append(&sample_record("b")).await.expect("append");
        }
        let content = std::fs::read_to_string(&path).expect("read");
        assert_eq!(content.lines().count(), 2);
    }
}
