use anyhow::{Context, Result};
use interview_core::recording::RecordedEvent;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Appends `RecordedEvent`s to a JSONL file from a background task.
///
/// Cloning shares the same writer. The task exits once every clone is
/// dropped.
#[derive(Clone)]
pub struct RecordingLogger {
    sender: mpsc::UnboundedSender<RecordedEvent>,
}

impl RecordingLogger {
    /// Must be called from within a tokio runtime.
    pub fn new(log_file_path: PathBuf) -> Result<Self> {
        if let Some(parent) = log_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create recording directory {:?}", parent)
                })?;
            }
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            if let Err(e) = Self::writer_task(&log_file_path, receiver).await {
                error!("Recording logger failed: {}", e);
            }
        });

        Ok(Self { sender })
    }

    pub fn record(&self, event: RecordedEvent) {
        if self.sender.send(event).is_err() {
            error!("Failed to send event to recording logger: receiver dropped");
        }
    }

    async fn writer_task(
        log_file_path: &Path,
        mut receiver: mpsc::UnboundedReceiver<RecordedEvent>,
    ) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path)
            .await
            .with_context(|| format!("Failed to open recording log {:?}", log_file_path))?;

        info!("Recording events to: {:?}", log_file_path);

        while let Some(event) = receiver.recv().await {
            let mut line = match serde_json::to_string(&event) {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to serialize recorded event: {}", e);
                    continue;
                }
            };
            line.push('\n');

            if let Err(e) = file.write_all(line.as_bytes()).await {
                error!("Failed to write recorded event: {}", e);
                continue;
            }
            if let Err(e) = file.flush().await {
                error!("Failed to flush recording log: {}", e);
            }
        }

        info!("Recording writer task shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::recording::{Direction, EventType};
    use std::collections::HashMap;
    use std::time::Duration;

    fn event(operation: &str) -> RecordedEvent {
        RecordedEvent {
            timestamp: "2026-03-01T09:00:00Z".to_string(),
            correlation_id: "corr-1".to_string(),
            event_type: EventType::CallbackReceived,
            direction: Direction::Request,
            operation: operation.to_string(),
            data: serde_json::json!({"interviewId": "e1"}),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_events_are_appended_as_jsonl() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("recordings.jsonl");

        let logger = RecordingLogger::new(path.clone()).unwrap();
        logger.record(event("session_ready"));
        logger.clone().record(event("result_submitted"));

        let mut lines = Vec::new();
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if let Ok(contents) = tokio::fs::read_to_string(&path).await {
                lines = contents.lines().map(str::to_string).collect();
                if lines.len() == 2 {
                    break;
                }
            }
        }

        assert_eq!(lines.len(), 2);
        let first: RecordedEvent = serde_json::from_str(&lines[0]).unwrap();
        let second: RecordedEvent = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(first.operation, "session_ready");
        assert_eq!(second.operation, "result_submitted");
    }
}
