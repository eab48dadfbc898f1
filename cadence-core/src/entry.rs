//! Ledger entry types.
//!
//! A task's history is an append-only sequence of [`ContextEntry`] values.
//! Callers never construct a `ContextEntry` directly: they submit a
//! [`NewEntry`] and the ledger assigns the sequence number, entry id, and
//! timestamp at append time. Once stored, an entry is immutable.

use crate::state::TaskState;
use crate::{new_entry_id, ContextId, EntryId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ACTORS
// ============================================================================

/// Kind of actor that produced a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// A human user
    User,
    /// An autonomous agent
    Agent,
    /// The platform itself (orchestrator, router, migrations)
    System,
}

impl ActorType {
    /// Stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::User => "user",
            ActorType::Agent => "agent",
            ActorType::System => "system",
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActorType {
    type Err = ActorTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(ActorType::User),
            "agent" => Ok(ActorType::Agent),
            "system" => Ok(ActorType::System),
            _ => Err(ActorTypeParseError(s.to_string())),
        }
    }
}

/// Error when parsing an invalid actor type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorTypeParseError(pub String);

impl fmt::Display for ActorTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid actor type: {}", self.0)
    }
}

impl std::error::Error for ActorTypeParseError {}

/// Identity of the actor that produced an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    /// Kind of actor
    pub actor_type: ActorType,
    /// Identifier (agent name, user id, or subsystem name)
    pub id: String,
    /// Version of the actor, if versioned (agent release, client build)
    pub version: Option<String>,
}

impl ActorRef {
    /// Create a user actor.
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::User,
            id: id.into(),
            version: None,
        }
    }

    /// Create an agent actor.
    pub fn agent(id: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::Agent,
            id: id.into(),
            version: None,
        }
    }

    /// Create a system actor.
    pub fn system(id: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::System,
            id: id.into(),
            version: None,
        }
    }

    /// Set the actor version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

// ============================================================================
// TRIGGER PROVENANCE
// ============================================================================

/// Provenance of the call that produced an entry.
///
/// Carried for audit and debugging; never parsed by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRef {
    /// Channel the call arrived on (e.g., "api", "resume", "dispatch")
    pub source: String,
    /// Upstream request id, if any
    pub request_id: Option<String>,
}

impl TriggerRef {
    /// Create a new trigger reference.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            request_id: None,
        }
    }

    /// Set the upstream request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

// ============================================================================
// CONTEXT ENTRY
// ============================================================================

/// A single immutable record in a task's ledger.
///
/// `sequence_number` is contiguous starting at 1 within one context and is
/// assigned by the ledger, never by the caller. `data` is an opaque payload
/// whose shape is operation-specific; the core merges it into derived state
/// without validating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Unique identifier for this entry
    pub entry_id: EntryId,
    /// Position within the ledger, 1-based, no gaps
    pub sequence_number: u64,
    /// Event time, assigned at append
    pub timestamp: Timestamp,
    /// Who produced the entry
    pub actor: ActorRef,
    /// Namespaced tag describing what happened (e.g. "business_found")
    pub operation: String,
    /// Operation-specific payload, opaque to the core
    pub data: serde_json::Value,
    /// Human-readable justification, for audit only
    pub reasoning: Option<String>,
    /// Provenance of the producing call
    pub trigger: Option<TriggerRef>,
}

/// Caller-supplied portion of an entry, before the ledger assigns identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    /// Who is producing the entry
    pub actor: ActorRef,
    /// Namespaced operation tag
    pub operation: String,
    /// Operation-specific payload
    pub data: serde_json::Value,
    /// Optional justification
    pub reasoning: Option<String>,
    /// Optional provenance
    pub trigger: Option<TriggerRef>,
}

impl NewEntry {
    /// Create a new entry with an empty payload.
    pub fn new(actor: ActorRef, operation: impl Into<String>) -> Self {
        Self {
            actor,
            operation: operation.into(),
            data: serde_json::Value::Object(serde_json::Map::new()),
            reasoning: None,
            trigger: None,
        }
    }

    /// Set the payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Set the reasoning text.
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Set the trigger provenance.
    pub fn with_trigger(mut self, trigger: TriggerRef) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Seal into a stored entry. Only the ledger calls this; the sequence
    /// number and timestamp come from the append, not the caller.
    pub fn into_entry(self, sequence_number: u64, timestamp: Timestamp) -> ContextEntry {
        ContextEntry {
            entry_id: new_entry_id(),
            sequence_number,
            timestamp,
            actor: self.actor,
            operation: self.operation,
            data: self.data,
            reasoning: self.reasoning,
            trigger: self.trigger,
        }
    }
}

// ============================================================================
// TASK CONTEXT
// ============================================================================

/// A task and its full event history.
///
/// `current_state` is a cached projection of `entries`; it is always
/// re-derivable and never authoritative on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    /// Unique identifier for this task
    pub context_id: ContextId,
    /// Template the task was created from
    pub task_template_id: String,
    /// Owning tenant
    pub tenant_id: String,
    /// When the task was created
    pub created_at: Timestamp,
    /// The ledger: ordered, append-only history
    pub entries: Vec<ContextEntry>,
    /// Cached projection of `entries`
    pub current_state: TaskState,
}

impl TaskContext {
    /// Create a new task with an empty ledger and pending state.
    pub fn new(task_template_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            context_id: crate::new_context_id(),
            task_template_id: task_template_id.into(),
            tenant_id: tenant_id.into(),
            created_at: chrono::Utc::now(),
            entries: Vec::new(),
            current_state: TaskState::default(),
        }
    }

    /// The most recently appended entry, if any.
    pub fn last_entry(&self) -> Option<&ContextEntry> {
        self.entries.last()
    }

    /// Number of entries in the ledger.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_type_roundtrip() {
        for at in [ActorType::User, ActorType::Agent, ActorType::System] {
            let parsed: ActorType = at.as_str().parse().unwrap();
            assert_eq!(at, parsed);
        }
        assert!("robot".parse::<ActorType>().is_err());
    }

    #[test]
    fn test_new_entry_seals_with_assigned_sequence() {
        let now = chrono::Utc::now();
        let entry = NewEntry::new(ActorRef::agent("discovery"), "business_found")
            .with_data(serde_json::json!({"name": "Acme"}))
            .with_reasoning("matched registry record")
            .into_entry(1, now);

        assert_eq!(entry.sequence_number, 1);
        assert_eq!(entry.timestamp, now);
        assert_eq!(entry.operation, "business_found");
        assert_eq!(entry.actor.id, "discovery");
        assert_eq!(entry.reasoning.as_deref(), Some("matched registry record"));
    }

    #[test]
    fn test_task_context_starts_empty_and_pending() {
        let ctx = TaskContext::new("llc_formation", "tenant-1");
        assert!(ctx.is_empty());
        assert_eq!(ctx.current_state.status, crate::TaskStatus::Pending);
        assert!(ctx.last_entry().is_none());
    }
}
