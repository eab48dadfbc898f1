//! CADENCE Ledger - Append-Only History and State Projection
//!
//! The ledger is the single source of truth for a task: an append-only,
//! per-context sequence of entries with contiguous sequence numbers assigned
//! here, never by callers. Everything a task "is" at any moment is a pure
//! fold of that history through the projector.

pub mod ledger;
pub mod projector;

pub use ledger::{is_audit_operation, ContextLedger};
pub use projector::{OperationEffect, OperationEffects, Projector};
