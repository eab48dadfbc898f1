//! Error types for CADENCE operations

use crate::ContextId;
use thiserror::Error;

/// Ledger append/read errors.
///
/// A rejected append leaves the ledger unchanged; `ConcurrentWrite` means
/// contention on the context, and the caller should retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Required field missing on entry: {field}")]
    MissingField { field: String },

    #[error("Concurrent append on context {context_id}, retry")]
    ConcurrentWrite { context_id: ContextId },

    #[error("Context {context_id} is terminal; operation {operation} is not an audit/remediation entry")]
    TerminalContext {
        context_id: ContextId,
        operation: String,
    },
}

/// Persistence layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Backend failure: {reason}")]
    Backend { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Configuration errors. Raised at discovery time and fail process startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Duplicate agent descriptor: {agent_id}")]
    DuplicateAgent { agent_id: String },

    #[error("Agent {agent_id} routes {direction} unknown agent {target}")]
    UnknownRouteTarget {
        agent_id: String,
        direction: String,
        target: String,
    },

    #[error("Malformed descriptor: {reason}")]
    MalformedDescriptor { reason: String },
}

/// Routing errors. A denied handoff is surfaced, never silently dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Routing denied from {from} to {to}: {reason}")]
    Denied {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Unknown agent: {agent_id}")]
    UnknownAgent { agent_id: String },

    #[error("No worker available for agent {agent_id}")]
    WorkerUnavailable { agent_id: String },
}

/// Worker invocation errors. Captured as ledger entries; the task stays
/// resumable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Worker {agent_id} failed: {reason}")]
    Failed { agent_id: String, reason: String },

    #[error("Worker {agent_id} timed out after {timeout_ms}ms")]
    Timeout { agent_id: String, timeout_ms: u64 },
}

/// Master error type for all CADENCE errors.
#[derive(Debug, Clone, Error)]
pub enum CadenceError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Result type alias for CADENCE operations.
pub type CadenceResult<T> = Result<T, CadenceError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_ledger_error_display_concurrent_write() {
        let err = LedgerError::ConcurrentWrite {
            context_id: Uuid::nil(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Concurrent append"));
        assert!(msg.contains("retry"));
    }

    #[test]
    fn test_ledger_error_display_terminal_context() {
        let err = LedgerError::TerminalContext {
            context_id: Uuid::nil(),
            operation: "profile_collection_started".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("terminal"));
        assert!(msg.contains("profile_collection_started"));
    }

    #[test]
    fn test_routing_error_display_denied() {
        let err = RoutingError::Denied {
            from: "celebration".to_string(),
            to: "compliance".to_string(),
            reason: "celebration may not send to compliance".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Routing denied"));
        assert!(msg.contains("celebration"));
        assert!(msg.contains("compliance"));
    }

    #[test]
    fn test_config_error_display_unknown_route_target() {
        let err = ConfigError::UnknownRouteTarget {
            agent_id: "discovery".to_string(),
            direction: "can_send_to".to_string(),
            target: "ghost".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("discovery"));
        assert!(msg.contains("can_send_to"));
        assert!(msg.contains("ghost"));
    }

    #[test]
    fn test_worker_error_display_timeout() {
        let err = WorkerError::Timeout {
            agent_id: "compliance".to_string(),
            timeout_ms: 5000,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("timed out"));
        assert!(msg.contains("5000"));
    }

    #[test]
    fn test_cadence_error_from_variants() {
        let ledger = CadenceError::from(LedgerError::MissingField {
            field: "operation".to_string(),
        });
        assert!(matches!(ledger, CadenceError::Ledger(_)));

        let store = CadenceError::from(StoreError::LockPoisoned);
        assert!(matches!(store, CadenceError::Store(_)));

        let config = CadenceError::from(ConfigError::DuplicateAgent {
            agent_id: "discovery".to_string(),
        });
        assert!(matches!(config, CadenceError::Config(_)));

        let routing = CadenceError::from(RoutingError::UnknownAgent {
            agent_id: "ghost".to_string(),
        });
        assert!(matches!(routing, CadenceError::Routing(_)));

        let worker = CadenceError::from(WorkerError::Failed {
            agent_id: "compliance".to_string(),
            reason: "upstream 500".to_string(),
        });
        assert!(matches!(worker, CadenceError::Worker(_)));
    }
}
