//! CADENCE Storage - Ledger Persistence Contract
//!
//! Defines the storage abstraction the ledger sits on. Implementations are
//! assumed atomic and durable per append; ordering and sequence assignment
//! are the ledger's job, not the store's. The in-memory store here backs
//! tests and single-process deployments.

use cadence_core::{ContextEntry, ContextId, StoreError};
use std::collections::HashMap;
use std::sync::RwLock;

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Persistence contract consumed by the ledger.
///
/// `read_history` never fails for an unknown context; it returns an empty
/// history. Stores must persist each append atomically.
pub trait LedgerStore: Send + Sync {
    /// Append a sealed entry to a context's history.
    fn append_entry(&self, context_id: ContextId, entry: ContextEntry)
        -> Result<ContextEntry, StoreError>;

    /// Read the full ordered history for a context. Empty for unknown ids.
    fn read_history(&self, context_id: ContextId) -> Result<Vec<ContextEntry>, StoreError>;

    /// Number of entries recorded for a context.
    fn entry_count(&self, context_id: ContextId) -> Result<u64, StoreError>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory reference store.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    histories: RwLock<HashMap<ContextId, Vec<ContextEntry>>>,
}

impl MemoryLedgerStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all stored histories.
    pub fn clear(&self) {
        if let Ok(mut h) = self.histories.write() {
            h.clear();
        }
    }

    /// Number of contexts with at least one entry.
    pub fn context_count(&self) -> usize {
        self.histories.read().map(|h| h.len()).unwrap_or(0)
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn append_entry(
        &self,
        context_id: ContextId,
        entry: ContextEntry,
    ) -> Result<ContextEntry, StoreError> {
        let mut histories = self.histories.write().map_err(|_| StoreError::LockPoisoned)?;
        let history = histories.entry(context_id).or_default();
        // The ledger assigns contiguous sequence numbers; an out-of-order
        // arrival means the single-writer contract was violated upstream.
        let expected = history.len() as u64 + 1;
        if entry.sequence_number != expected {
            return Err(StoreError::Backend {
                reason: format!(
                    "out-of-order append: got sequence {}, expected {}",
                    entry.sequence_number, expected
                ),
            });
        }
        history.push(entry.clone());
        Ok(entry)
    }

    fn read_history(&self, context_id: ContextId) -> Result<Vec<ContextEntry>, StoreError> {
        let histories = self.histories.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(histories.get(&context_id).cloned().unwrap_or_default())
    }

    fn entry_count(&self, context_id: ContextId) -> Result<u64, StoreError> {
        let histories = self.histories.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(histories.get(&context_id).map(|h| h.len() as u64).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{new_context_id, ActorRef, NewEntry};

    fn entry(seq: u64, operation: &str) -> ContextEntry {
        NewEntry::new(ActorRef::agent("discovery"), operation)
            .into_entry(seq, chrono::Utc::now())
    }

    #[test]
    fn test_read_unknown_context_is_empty() {
        let store = MemoryLedgerStore::new();
        let history = store.read_history(new_context_id()).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_append_then_read_preserves_order() {
        let store = MemoryLedgerStore::new();
        let ctx = new_context_id();
        store.append_entry(ctx, entry(1, "business_found")).unwrap();
        store.append_entry(ctx, entry(2, "profile_collection_completed")).unwrap();

        let history = store.read_history(ctx).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].operation, "business_found");
        assert_eq!(history[1].sequence_number, 2);
        assert_eq!(store.entry_count(ctx).unwrap(), 2);
    }

    #[test]
    fn test_out_of_order_append_is_rejected() {
        let store = MemoryLedgerStore::new();
        let ctx = new_context_id();
        store.append_entry(ctx, entry(1, "business_found")).unwrap();

        let err = store.append_entry(ctx, entry(3, "requirements_identified")).unwrap_err();
        assert!(matches!(err, StoreError::Backend { .. }));
        // The rejected entry left the history unchanged.
        assert_eq!(store.entry_count(ctx).unwrap(), 1);
    }

    #[test]
    fn test_contexts_are_independent() {
        let store = MemoryLedgerStore::new();
        let a = new_context_id();
        let b = new_context_id();
        store.append_entry(a, entry(1, "business_found")).unwrap();
        store.append_entry(b, entry(1, "business_found")).unwrap();
        assert_eq!(store.context_count(), 2);
        assert_eq!(store.entry_count(a).unwrap(), 1);
    }
}
