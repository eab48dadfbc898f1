//! Worker contract types.
//!
//! A worker is a task-scoped instance of an agent. The router hands it a
//! [`WorkerRequest`] plus the task context, and it answers with a
//! [`WorkerResponse`] whose `operation` and `data` become the next ledger
//! entry. UI requests are opaque to the core and passed through untouched
//! to a rendering collaborator.

use crate::AgentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// WORKER STATUS
// ============================================================================

/// Outcome of a single worker invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// The worker finished its portion of the task
    Completed,
    /// The worker needs a user response before continuing
    NeedsInput,
    /// The worker is handing off to another agent
    Delegated,
    /// The worker failed; the task remains resumable
    Error,
}

impl WorkerStatus {
    /// Stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Completed => "completed",
            WorkerStatus::NeedsInput => "needs_input",
            WorkerStatus::Delegated => "delegated",
            WorkerStatus::Error => "error",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkerStatus {
    type Err = WorkerStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" => Ok(WorkerStatus::Completed),
            "needs_input" | "needsinput" => Ok(WorkerStatus::NeedsInput),
            "delegated" => Ok(WorkerStatus::Delegated),
            "error" => Ok(WorkerStatus::Error),
            _ => Err(WorkerStatusParseError(s.to_string())),
        }
    }
}

/// Error when parsing an invalid worker status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatusParseError(pub String);

impl fmt::Display for WorkerStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid worker status: {}", self.0)
    }
}

impl std::error::Error for WorkerStatusParseError {}

// ============================================================================
// UI REQUESTS
// ============================================================================

/// A rendering request emitted by a worker.
///
/// Opaque to the core: the payload is forwarded to the rendering
/// collaborator exactly as emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UiRequest(pub serde_json::Value);

impl UiRequest {
    /// Wrap a raw rendering payload.
    pub fn new(payload: serde_json::Value) -> Self {
        Self(payload)
    }
}

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

/// Input handed to a worker by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// What the sender wants done
    pub instruction: String,
    /// Sender-supplied payload
    pub data: serde_json::Value,
    /// Sender-supplied contextual hints (distinct from the task ledger)
    pub context: serde_json::Value,
}

impl WorkerRequest {
    /// Create a request with empty payloads.
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            data: serde_json::Value::Object(serde_json::Map::new()),
            context: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Set contextual hints.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// A worker's answer, recorded into the ledger by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// Outcome of the invocation
    pub status: WorkerStatus,
    /// Operation tag for the resulting ledger entry
    pub operation: String,
    /// Payload for the resulting ledger entry
    pub data: serde_json::Value,
    /// Rendering requests, passed through untouched
    pub ui_requests: Vec<UiRequest>,
    /// Handoff hint: which agent should act next
    pub next_agent: Option<AgentId>,
    /// Human-readable justification
    pub reasoning: Option<String>,
}

impl WorkerResponse {
    fn base(status: WorkerStatus, operation: impl Into<String>) -> Self {
        Self {
            status,
            operation: operation.into(),
            data: serde_json::Value::Object(serde_json::Map::new()),
            ui_requests: Vec::new(),
            next_agent: None,
            reasoning: None,
        }
    }

    /// A completed response.
    pub fn completed(operation: impl Into<String>) -> Self {
        Self::base(WorkerStatus::Completed, operation)
    }

    /// A response suspending the task for user input.
    pub fn needs_input(operation: impl Into<String>) -> Self {
        Self::base(WorkerStatus::NeedsInput, operation)
    }

    /// A handoff response naming the next agent.
    pub fn delegated(operation: impl Into<String>, next_agent: impl Into<AgentId>) -> Self {
        let mut r = Self::base(WorkerStatus::Delegated, operation);
        r.next_agent = Some(next_agent.into());
        r
    }

    /// An error response. The operation tag gains an `_error` suffix if it
    /// does not already carry one, so error entries are recognizable in the
    /// ledger and appendable to terminal contexts.
    pub fn error(operation: impl Into<String>) -> Self {
        let mut op = operation.into();
        if !op.ends_with("_error") {
            op.push_str("_error");
        }
        Self::base(WorkerStatus::Error, op)
    }

    /// Set the payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Add a rendering request.
    pub fn with_ui_request(mut self, request: UiRequest) -> Self {
        self.ui_requests.push(request);
        self
    }

    /// Set the next-agent hint.
    pub fn with_next_agent(mut self, agent_id: impl Into<AgentId>) -> Self {
        self.next_agent = Some(agent_id.into());
        self
    }

    /// Set the reasoning text.
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

// ============================================================================
// WORKER TRAITS
// ============================================================================

/// A task-scoped instance of an agent.
///
/// Workers are `Send` so the router can run them on a scratch thread under
/// a dispatch timeout. A worker instance belongs to exactly one task; no
/// mutable field of one task's worker is ever visible to another task's
/// worker of the same agent type.
pub trait Worker: Send {
    /// The agent this worker instantiates.
    fn agent_id(&self) -> &str;

    /// Handle one request against the task's current context.
    fn process(
        &mut self,
        request: WorkerRequest,
        task: &crate::TaskContext,
    ) -> Result<WorkerResponse, crate::WorkerError>;
}

/// Produces workers keyed by `(agent_id, context_id)`.
///
/// Every `resolve` call must yield a fresh instance, never a shared
/// singleton; this is the isolation boundary that lets tasks run
/// concurrently without cross-task data leakage.
pub trait WorkerFactory: Send + Sync {
    /// Build a task-scoped worker, or `None` if the agent has no
    /// implementation registered.
    fn resolve(&self, agent_id: &str, context_id: crate::ContextId) -> Option<Box<dyn Worker>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_status_roundtrip() {
        for ws in [
            WorkerStatus::Completed,
            WorkerStatus::NeedsInput,
            WorkerStatus::Delegated,
            WorkerStatus::Error,
        ] {
            let parsed: WorkerStatus = ws.as_str().parse().unwrap();
            assert_eq!(ws, parsed);
        }
    }

    #[test]
    fn test_error_response_gains_suffix() {
        let r = WorkerResponse::error("profile_collection");
        assert_eq!(r.operation, "profile_collection_error");
        // Already-suffixed tags are left alone.
        let r = WorkerResponse::error("profile_collection_error");
        assert_eq!(r.operation, "profile_collection_error");
    }

    #[test]
    fn test_delegated_response_names_next_agent() {
        let r = WorkerResponse::delegated("business_found", "profiler")
            .with_data(serde_json::json!({"business": {"name": "Acme"}}));
        assert_eq!(r.status, WorkerStatus::Delegated);
        assert_eq!(r.next_agent.as_deref(), Some("profiler"));
    }

    #[test]
    fn test_ui_request_is_transparent_json() {
        let payload = serde_json::json!({"component": "form", "fields": ["ein"]});
        let req = UiRequest::new(payload.clone());
        let encoded = serde_json::to_value(&req).unwrap();
        assert_eq!(encoded, payload);
    }
}
