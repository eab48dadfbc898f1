//! The Context Ledger.
//!
//! Appends are serialized per context: the ledger holds a mutex per
//! `ContextId` around the read-compute-append cycle so two concurrent
//! callers can never compute the same sequence number. Contention surfaces
//! as `LedgerError::ConcurrentWrite` and the caller retries. Distinct
//! contexts never contend.

use crate::projector::Projector;
use cadence_core::{
    CadenceResult, ContextEntry, ContextId, LedgerError, NewEntry, TaskState,
};
use cadence_storage::LedgerStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, TryLockError};

/// Operations that remain appendable after a context turns terminal.
///
/// Terminal contexts accept audit and remediation records only; business
/// operations can never silently re-open a completed or failed task.
pub fn is_audit_operation(operation: &str) -> bool {
    operation.ends_with("_audit")
        || operation.ends_with("_remediation")
        || operation.ends_with("_error")
}

/// Append-only, per-task event log over a [`LedgerStore`].
pub struct ContextLedger {
    store: Arc<dyn LedgerStore>,
    projector: Projector,
    locks: Mutex<HashMap<ContextId, Arc<Mutex<()>>>>,
}

impl ContextLedger {
    /// Create a ledger over a store, using the given projector to detect
    /// terminal contexts at append time.
    pub fn new(store: Arc<dyn LedgerStore>, projector: Projector) -> Self {
        Self {
            store,
            projector,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The projector this ledger derives state with.
    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    /// Append an entry to a context's history.
    ///
    /// Validates required fields, serializes against other writers on the
    /// same context, assigns `sequence_number = len(history) + 1` and the
    /// timestamp, and stores the sealed entry. The returned copy is
    /// immutable. Fails with `ConcurrentWrite` under contention (retry) and
    /// rejects non-audit appends to terminal contexts.
    pub fn append(&self, context_id: ContextId, entry: NewEntry) -> CadenceResult<ContextEntry> {
        if entry.operation.trim().is_empty() {
            return Err(LedgerError::MissingField {
                field: "operation".to_string(),
            }
            .into());
        }
        if entry.actor.id.trim().is_empty() {
            return Err(LedgerError::MissingField {
                field: "actor.id".to_string(),
            }
            .into());
        }

        let lock = self.context_lock(context_id)?;
        let _guard = match lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                return Err(LedgerError::ConcurrentWrite { context_id }.into());
            }
            Err(TryLockError::Poisoned(_)) => {
                return Err(cadence_core::StoreError::LockPoisoned.into());
            }
        };

        let history = self.store.read_history(context_id).map_err(cadence_core::CadenceError::from)?;
        let current = self.projector.project(&history);
        if current.status.is_terminal() && !is_audit_operation(&entry.operation) {
            tracing::warn!(
                context_id = %context_id,
                operation = %entry.operation,
                "append rejected: context is terminal"
            );
            return Err(LedgerError::TerminalContext {
                context_id,
                operation: entry.operation,
            }
            .into());
        }

        let sequence_number = history.len() as u64 + 1;
        let sealed = entry.into_entry(sequence_number, chrono::Utc::now());
        let stored = self
            .store
            .append_entry(context_id, sealed)
            .map_err(cadence_core::CadenceError::from)?;

        tracing::debug!(
            context_id = %context_id,
            sequence = stored.sequence_number,
            operation = %stored.operation,
            actor = %stored.actor.id,
            "entry appended"
        );
        Ok(stored)
    }

    /// Read a context's full history. Empty for unknown ids, never an error.
    pub fn read(&self, context_id: ContextId) -> CadenceResult<Vec<ContextEntry>> {
        Ok(self.store.read_history(context_id).map_err(cadence_core::CadenceError::from)?)
    }

    /// Project a context's current state straight off the store.
    pub fn project(&self, context_id: ContextId) -> CadenceResult<TaskState> {
        let history = self.read(context_id)?;
        Ok(self.projector.project(&history))
    }

    fn context_lock(&self, context_id: ContextId) -> CadenceResult<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| cadence_core::StoreError::LockPoisoned)?;
        let lock = locks.entry(context_id).or_default().clone();
        // Reclaim locks no appender currently holds, otherwise the registry
        // grows by one entry per context ever written. A strong count above
        // one means a clone is held outside the map (including the one just
        // taken), so in-use locks survive.
        locks.retain(|_, l| Arc::strong_count(l) > 1);
        Ok(lock)
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{new_context_id, ActorRef, CadenceError, TaskStatus};
    use cadence_storage::MemoryLedgerStore;
    use serde_json::json;

    fn ledger() -> ContextLedger {
        ContextLedger::new(Arc::new(MemoryLedgerStore::new()), Projector::workflow_default())
    }

    fn agent_entry(operation: &str) -> NewEntry {
        NewEntry::new(ActorRef::agent("discovery"), operation)
    }

    #[test]
    fn test_append_assigns_contiguous_sequence_numbers() {
        let ledger = ledger();
        let ctx = new_context_id();
        for i in 1..=5u64 {
            let stored = ledger.append(ctx, agent_entry("business_found")).unwrap();
            assert_eq!(stored.sequence_number, i);
        }
        let history = ledger.read(ctx).unwrap();
        let seqs: Vec<u64> = history.iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_append_rejects_missing_operation() {
        let ledger = ledger();
        let ctx = new_context_id();
        let err = ledger.append(ctx, agent_entry("  ")).unwrap_err();
        assert!(matches!(
            err,
            CadenceError::Ledger(LedgerError::MissingField { .. })
        ));
        assert!(ledger.read(ctx).unwrap().is_empty());
    }

    #[test]
    fn test_append_rejects_missing_actor_id() {
        let ledger = ledger();
        let ctx = new_context_id();
        let err = ledger
            .append(ctx, NewEntry::new(ActorRef::agent(""), "business_found"))
            .unwrap_err();
        assert!(matches!(
            err,
            CadenceError::Ledger(LedgerError::MissingField { .. })
        ));
    }

    #[test]
    fn test_terminal_context_rejects_business_appends() {
        let ledger = ledger();
        let ctx = new_context_id();
        ledger
            .append(
                ctx,
                agent_entry("workflow_completed").with_data(json!({"status": "completed"})),
            )
            .unwrap();
        assert_eq!(ledger.project(ctx).unwrap().status, TaskStatus::Completed);

        let err = ledger.append(ctx, agent_entry("business_found")).unwrap_err();
        assert!(matches!(
            err,
            CadenceError::Ledger(LedgerError::TerminalContext { .. })
        ));
        // Audit entries are still accepted.
        let audit = ledger
            .append(ctx, NewEntry::new(ActorRef::system("auditor"), "retention_audit"))
            .unwrap();
        assert_eq!(audit.sequence_number, 2);
        // The audit append did not re-open the task.
        assert_eq!(ledger.project(ctx).unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn test_read_unknown_context_is_empty() {
        let ledger = ledger();
        assert!(ledger.read(new_context_id()).unwrap().is_empty());
    }

    #[test]
    fn test_is_audit_operation() {
        assert!(is_audit_operation("retention_audit"));
        assert!(is_audit_operation("filing_remediation"));
        assert!(is_audit_operation("compliance_error"));
        assert!(!is_audit_operation("business_found"));
    }

    #[test]
    fn test_lock_registry_does_not_grow_with_context_count() {
        let ledger = ledger();
        for _ in 0..50 {
            let ctx = new_context_id();
            ledger.append(ctx, agent_entry("business_found")).unwrap();
        }
        // Idle locks are reclaimed; only the most recent appender's lock
        // can still be resident.
        assert!(ledger.lock_count() <= 1);
    }

    #[test]
    fn test_distinct_contexts_do_not_contend() {
        use std::thread;

        let ledger = Arc::new(ledger());
        let contexts: Vec<ContextId> = (0..4).map(|_| new_context_id()).collect();
        let mut handles = Vec::new();
        for ctx in &contexts {
            let ledger = Arc::clone(&ledger);
            let ctx = *ctx;
            handles.push(thread::spawn(move || {
                for _ in 0..25 {
                    // No retry loop: distinct contexts never hit ConcurrentWrite.
                    ledger.append(ctx, agent_entry("business_found")).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        for ctx in contexts {
            assert_eq!(ledger.read(ctx).unwrap().len(), 25);
        }
    }
}
