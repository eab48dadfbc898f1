//! CADENCE Core - Entity Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no business logic.

use uuid::Uuid;

pub mod capability;
pub mod entry;
pub mod error;
pub mod state;
pub mod worker;

pub use capability::{
    AgentAvailability, AgentCapability, AgentDescriptor, RoutingSpec,
};
pub use entry::{ActorRef, ActorType, ContextEntry, NewEntry, TaskContext, TriggerRef};
pub use error::{
    CadenceError, CadenceResult, ConfigError, LedgerError, RoutingError, StoreError, WorkerError,
};
pub use state::{TaskState, TaskStatus, TaskStatusParseError};
pub use worker::{UiRequest, Worker, WorkerFactory, WorkerRequest, WorkerResponse, WorkerStatus};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Task context identifier using UUIDv7 for timestamp-sortable IDs.
pub type ContextId = Uuid;

/// Ledger entry identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntryId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Agent identifier. Agents are declared in static descriptors and referenced
/// by symbolic name, so the id is a string rather than a UUID.
pub type AgentId = String;

/// Generate a new UUIDv7 context id (timestamp-sortable).
pub fn new_context_id() -> ContextId {
    Uuid::now_v7()
}

/// Generate a new UUIDv7 entry id (timestamp-sortable).
pub fn new_entry_id() -> EntryId {
    Uuid::now_v7()
}
