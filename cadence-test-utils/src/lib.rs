//! CADENCE Test Utilities
//!
//! Centralized test infrastructure for the CADENCE workspace:
//! - Scripted workers and factories for orchestration tests
//! - Agent descriptor fixtures for common routing topologies
//! - Proptest generators for ledger entries
//! - Entry fixtures

// Re-export core types for convenience
pub use cadence_core::{
    ActorRef, ActorType, AgentCapability, AgentDescriptor, AgentId, CadenceError, CadenceResult,
    ContextEntry, ContextId, NewEntry, TaskContext, TaskState, TaskStatus, TriggerRef, UiRequest,
    Worker, WorkerError, WorkerFactory, WorkerRequest, WorkerResponse, WorkerStatus,
};

use proptest::prelude::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

// ============================================================================
// SCRIPTED WORKERS
// ============================================================================

/// One-shot worker answering with a pre-scripted response.
pub struct ScriptedWorker {
    agent_id: String,
    response: Option<WorkerResponse>,
}

impl ScriptedWorker {
    pub fn new(agent_id: impl Into<String>, response: WorkerResponse) -> Self {
        Self {
            agent_id: agent_id.into(),
            response: Some(response),
        }
    }
}

impl Worker for ScriptedWorker {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn process(
        &mut self,
        _request: WorkerRequest,
        _task: &TaskContext,
    ) -> Result<WorkerResponse, WorkerError> {
        self.response.take().ok_or_else(|| WorkerError::Failed {
            agent_id: self.agent_id.clone(),
            reason: "script exhausted".to_string(),
        })
    }
}

/// Factory serving scripted responses per agent, in enqueue order.
///
/// Each `resolve` consumes one queued response and wraps it in a fresh
/// [`ScriptedWorker`], so worker instances stay task-scoped the way real
/// factories build them. Resolving an agent with an empty queue yields a
/// worker that fails, which orchestration records as an error entry.
#[derive(Default)]
pub struct ScriptedFactory {
    scripts: Mutex<HashMap<String, VecDeque<WorkerResponse>>>,
    requests_seen: Arc<Mutex<Vec<(String, ContextId, WorkerRequest)>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next response for an agent.
    pub fn enqueue(&self, agent_id: impl Into<String>, response: WorkerResponse) {
        self.scripts
            .lock()
            .unwrap()
            .entry(agent_id.into())
            .or_default()
            .push_back(response);
    }

    /// Responses still queued for an agent.
    pub fn remaining(&self, agent_id: &str) -> usize {
        self.scripts
            .lock()
            .unwrap()
            .get(agent_id)
            .map_or(0, VecDeque::len)
    }

    /// Requests the factory's workers have received so far.
    pub fn requests_seen(&self) -> Vec<(String, ContextId, WorkerRequest)> {
        self.requests_seen.lock().unwrap().clone()
    }
}

impl WorkerFactory for ScriptedFactory {
    fn resolve(&self, agent_id: &str, context_id: ContextId) -> Option<Box<dyn Worker>> {
        let response = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(agent_id)?
            .pop_front()?;
        Some(Box::new(RecordingWorker {
            agent_id: agent_id.to_string(),
            context_id,
            response: Some(response),
            log: Arc::clone(&self.requests_seen),
        }))
    }
}

/// Worker that records the request it received into the factory's shared
/// log before answering from its script.
struct RecordingWorker {
    agent_id: String,
    context_id: ContextId,
    response: Option<WorkerResponse>,
    log: Arc<Mutex<Vec<(String, ContextId, WorkerRequest)>>>,
}

impl Worker for RecordingWorker {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn process(
        &mut self,
        request: WorkerRequest,
        _task: &TaskContext,
    ) -> Result<WorkerResponse, WorkerError> {
        self.log
            .lock()
            .unwrap()
            .push((self.agent_id.clone(), self.context_id, request));
        self.response.take().ok_or_else(|| WorkerError::Failed {
            agent_id: self.agent_id.clone(),
            reason: "script exhausted".to_string(),
        })
    }
}

// ============================================================================
// DESCRIPTOR FIXTURES
// ============================================================================

/// Descriptors for a linear pipeline: each agent may send to its successor
/// and receive from its predecessor, both edges declared.
pub fn pipeline_descriptors(agent_ids: &[&str]) -> Vec<AgentDescriptor> {
    agent_ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let can_receive_from = if i > 0 {
                vec![agent_ids[i - 1].to_string()]
            } else {
                vec![]
            };
            let can_send_to = if i + 1 < agent_ids.len() {
                vec![agent_ids[i + 1].to_string()]
            } else {
                vec![]
            };
            AgentDescriptor::new(*id).with_routing(can_receive_from, can_send_to)
        })
        .collect()
}

// ============================================================================
// ENTRY FIXTURES
// ============================================================================

/// A sealed agent entry for projector-level tests that bypass the ledger.
pub fn agent_entry(
    agent_id: &str,
    operation: &str,
    sequence_number: u64,
    data: serde_json::Value,
) -> ContextEntry {
    NewEntry::new(ActorRef::agent(agent_id), operation)
        .with_data(data)
        .into_entry(sequence_number, chrono::Utc::now())
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Strategy over the workflow operation alphabet.
pub fn arb_operation() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("business_found".to_string()),
        Just("profile_collection_completed".to_string()),
        Just("requirements_identified".to_string()),
        Just("workflow_completed".to_string()),
        Just("notice_sent".to_string()),
        Just("retention_audit".to_string()),
    ]
}

/// Strategy producing a well-formed history with contiguous sequence
/// numbers starting at 1.
pub fn arb_history(max_len: usize) -> impl Strategy<Value = Vec<ContextEntry>> {
    prop::collection::vec(arb_operation(), 0..=max_len).prop_map(|operations| {
        operations
            .into_iter()
            .enumerate()
            .map(|(i, op)| {
                agent_entry(
                    "discovery",
                    &op,
                    (i + 1) as u64,
                    serde_json::json!({"step": i}),
                )
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_factory_serves_in_order_and_exhausts() {
        let factory = ScriptedFactory::new();
        factory.enqueue("discovery", WorkerResponse::completed("first"));
        factory.enqueue("discovery", WorkerResponse::completed("second"));

        let task = TaskContext::new("t", "tenant-1");
        let mut w = factory.resolve("discovery", task.context_id).unwrap();
        let r = w.process(WorkerRequest::new("go"), &task).unwrap();
        assert_eq!(r.operation, "first");
        let mut w = factory.resolve("discovery", task.context_id).unwrap();
        let r = w.process(WorkerRequest::new("go"), &task).unwrap();
        assert_eq!(r.operation, "second");
        assert!(factory.resolve("discovery", task.context_id).is_none());
        assert_eq!(factory.requests_seen().len(), 2);
    }

    #[test]
    fn test_unknown_agent_resolves_to_none() {
        let factory = ScriptedFactory::new();
        assert!(factory
            .resolve("ghost", cadence_core::new_context_id())
            .is_none());
    }

    #[test]
    fn test_pipeline_descriptors_declare_both_edges() {
        let descriptors = pipeline_descriptors(&["a", "b", "c"]);
        let b = descriptors[1].clone().into_capability();
        assert!(b.may_receive_from("a"));
        assert!(b.may_send_to("c"));
        assert!(!b.may_send_to("a"));
    }
}
