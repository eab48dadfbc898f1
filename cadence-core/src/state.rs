//! Derived task state.
//!
//! A [`TaskState`] is never persisted as ground truth: it is always the
//! result of folding a ledger prefix through the projector.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// TASK STATUS
// ============================================================================

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, no work recorded yet
    #[default]
    Pending,
    /// Work in progress
    Active,
    /// Suspended awaiting a user response
    NeedsInput,
    /// Terminal: all required goals met
    Completed,
    /// Terminal: unrecoverable failure recorded
    Failed,
}

impl TaskStatus {
    /// Stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Active => "active",
            TaskStatus::NeedsInput => "needs_input",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state. Terminal contexts accept only
    /// audit/remediation appends.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "active" => Ok(TaskStatus::Active),
            "needs_input" | "needsinput" => Ok(TaskStatus::NeedsInput),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(TaskStatusParseError(s.to_string())),
        }
    }
}

/// Error when parsing an invalid task status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid task status: {}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ============================================================================
// TASK STATE
// ============================================================================

/// Snapshot derived by folding a ledger prefix.
///
/// `completeness` is monotonically non-decreasing across the ledger: an
/// operation may add work but never undoes prior completion signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Free-form phase label (e.g. "discovery", "compliance")
    pub phase: String,
    /// Completion estimate, 0-100
    pub completeness: u8,
    /// Merged view of every entry's payload, keyed by operation semantics
    pub data: serde_json::Value,
    /// Timestamp of the last folded entry (not wall-clock time)
    pub last_updated: Option<Timestamp>,
}

impl Default for TaskState {
    fn default() -> Self {
        Self {
            status: TaskStatus::Pending,
            phase: String::new(),
            completeness: 0,
            data: serde_json::Value::Object(serde_json::Map::new()),
            last_updated: None,
        }
    }
}

impl TaskState {
    /// Look up a top-level key in the merged data view.
    pub fn data_key(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.as_object().and_then(|m| m.get(key))
    }
}
