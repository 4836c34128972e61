use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::{AttemptId, WorkflowState};

/// One workflow transition as it appears in `events.jsonl`.
///
/// Serialized internally tagged, so every line carries `"type": "<snake_case>"`
/// next to the variant's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    FileSelected {
        mime_type: String,
        width: u32,
        height: u32,
        byte_len: usize,
        sha256: String,
        superseded_attempt: Option<AttemptId>,
    },
    TransformStarted {
        attempt: AttemptId,
    },
    TransformSucceeded {
        attempt: AttemptId,
        mime_type: String,
        payload_chars: usize,
    },
    TransformFailed {
        attempt: AttemptId,
        error_kind: String,
        message: String,
    },
    /// A completion arrived for an attempt that is no longer in flight.
    CompletionDiscarded {
        attempt: AttemptId,
        outcome: String,
        state: WorkflowState,
    },
    WorkflowReset {
        superseded_attempt: Option<AttemptId>,
    },
    PreviewReleased {
        path: PathBuf,
    },
}

impl WorkflowEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::FileSelected { .. } => "file_selected",
            WorkflowEvent::TransformStarted { .. } => "transform_started",
            WorkflowEvent::TransformSucceeded { .. } => "transform_succeeded",
            WorkflowEvent::TransformFailed { .. } => "transform_failed",
            WorkflowEvent::CompletionDiscarded { .. } => "completion_discarded",
            WorkflowEvent::WorkflowReset { .. } => "workflow_reset",
            WorkflowEvent::PreviewReleased { .. } => "preview_released",
        }
    }
}

#[derive(Serialize)]
struct EventRecord<'a> {
    session_id: &'a str,
    ts: String,
    #[serde(flatten)]
    event: &'a WorkflowEvent,
}

/// Session-scoped JSONL sink. The file is opened once in append mode and
/// shared by clones; each event is written as a single line under the lock.
#[derive(Debug, Clone)]
pub struct EventLog {
    session_id: Arc<str>,
    sink: Arc<Mutex<File>>,
}

impl EventLog {
    pub fn open(path: &Path, session_id: impl Into<String>) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open event log {}", path.display()))?;
        let session_id: String = session_id.into();
        Ok(Self {
            session_id: Arc::from(session_id),
            sink: Arc::new(Mutex::new(file)),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record(&self, event: &WorkflowEvent) -> anyhow::Result<()> {
        let record = EventRecord {
            session_id: &self.session_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            event,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = self
            .sink
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}
