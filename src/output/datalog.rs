//! Append-only data log.
//!
//! The application loop records serviced commands and sensor refreshes as
//! JSON lines. Log failures are reported to the caller but never reach the
//! Modbus layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::utils::error::NodeError;

#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub details: Value,
}

impl LogRecord {
    pub fn new(event: impl Into<String>, details: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            event: event.into(),
            details,
        }
    }
}

#[async_trait]
pub trait DataLogSink: Send + Sync {
    async fn append(&self, record: &LogRecord) -> Result<(), NodeError>;
    fn sink_type(&self) -> &str;
    fn destination(&self) -> &str;
}

pub struct ConsoleDataLog;

#[async_trait]
impl DataLogSink for ConsoleDataLog {
    async fn append(&self, record: &LogRecord) -> Result<(), NodeError> {
        println!("{}", serde_json::to_string(record)?);
        Ok(())
    }

    fn sink_type(&self) -> &str {
        "console"
    }

    fn destination(&self) -> &str {
        "stdout"
    }
}

pub struct FileDataLog {
    file_path: String,
}

impl FileDataLog {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_string_lossy().to_string(),
        }
    }
}

#[async_trait]
impl DataLogSink for FileDataLog {
    async fn append(&self, record: &LogRecord) -> Result<(), NodeError> {
        let line = serde_json::to_string(record)?;

        if let Some(parent) = Path::new(&self.file_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .map_err(|e| {
                error!("❌ Failed to open data log {}: {}", self.file_path, e);
                NodeError::CommunicationError(format!("Failed to open data log: {}", e))
            })?;

        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn sink_type(&self) -> &str {
        "file"
    }

    fn destination(&self) -> &str {
        &self.file_path
    }
}

/// Fans a record out to every configured sink; failures are logged and
/// counted, not propagated.
pub async fn broadcast(sinks: &[Box<dyn DataLogSink>], record: &LogRecord) {
    for sink in sinks {
        match sink.append(record).await {
            Ok(_) => {}
            Err(e) => {
                error!(
                    "❌ Failed to append record via {} to {}: {}",
                    sink.sink_type(),
                    sink.destination(),
                    e
                );
            }
        }
    }
    if !sinks.is_empty() {
        info!("📝 Logged event '{}' to {} sink(s)", record.event, sinks.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_file_sink_appends_json_lines() {
        let dir = std::env::temp_dir().join("isurnode_datalog_test");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("events.jsonl");
        let sink = FileDataLog::new(&path);

        sink.append(&LogRecord::new("analog_refresh", json!({"channel": 0, "mv": 1250})))
            .await
            .unwrap();
        sink.append(&LogRecord::new("valve_pulse", json!({"channel": "EV0", "action": "open"})))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "analog_refresh");
        assert_eq!(first["details"]["mv"], 1250);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
