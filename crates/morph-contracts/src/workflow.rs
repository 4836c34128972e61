use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::image::{GeneratedImage, SourceSummary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    #[default]
    Idle,
    Processing,
    Success,
    Error,
}

impl WorkflowState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Idle => "IDLE",
            WorkflowState::Processing => "PROCESSING",
            WorkflowState::Success => "SUCCESS",
            WorkflowState::Error => "ERROR",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one transformation attempt. Only the workflow mints these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub state: WorkflowState,
    pub source: Option<SourceSummary>,
    pub preview_path: Option<PathBuf>,
    pub result: Option<GeneratedImage>,
    pub error: Option<String>,
    /// Set when `error` came from a missing or rejected API key.
    #[serde(default)]
    pub credential_error: bool,
    pub attempt: Option<AttemptId>,
}
