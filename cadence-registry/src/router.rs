//! The Router.
//!
//! Enforces the permission graph on every handoff and resolves agents to
//! task-scoped workers. Permission is directional and checked on both
//! sides: the sender must declare the receiver in `can_send_to` AND the
//! receiver must declare the sender in `can_receive_from`. A denied handoff
//! is surfaced as `RoutingError::Denied`, never silently dropped, and
//! appends nothing.
//!
//! Worker invocations run on a scratch thread under a caller-supplied
//! timeout. A timeout or worker failure becomes an `*_error` ledger entry;
//! it never corrupts the ledger and the task stays resumable.

use crate::registry::CapabilityRegistry;
use cadence_core::{
    ActorRef, AgentAvailability, CadenceResult, ContextEntry, NewEntry, RoutingError, TaskContext,
    TriggerRef, Worker, WorkerError, WorkerFactory, WorkerRequest, WorkerResponse, WorkerStatus,
};
use cadence_ledger::ContextLedger;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// Default wall-clock budget for one worker invocation.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a successful dispatch: the entry now in the ledger and the
/// worker response it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// The entry appended to the ledger
    pub entry: ContextEntry,
    /// The worker's response (error responses included)
    pub response: WorkerResponse,
}

/// Permission-checked dispatcher between agents.
pub struct Router {
    registry: Arc<CapabilityRegistry>,
    factory: Arc<dyn WorkerFactory>,
    ledger: Arc<ContextLedger>,
    timeout: Duration,
}

impl Router {
    /// Create a router over a discovered registry, a worker factory, and
    /// the ledger dispatches append to.
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        factory: Arc<dyn WorkerFactory>,
        ledger: Arc<ContextLedger>,
    ) -> Self {
        Self {
            registry,
            factory,
            ledger,
            timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    /// Override the per-dispatch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The registry this router enforces.
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Check both directions of a handoff edge.
    pub fn can_route(&self, from: &str, to: &str) -> bool {
        let (Some(sender), Some(receiver)) = (self.registry.lookup(from), self.registry.lookup(to))
        else {
            return false;
        };
        sender.may_send_to(to) && receiver.may_receive_from(from)
    }

    /// Resolve an agent to a fresh task-scoped worker instance.
    pub fn resolve_worker(
        &self,
        agent_id: &str,
        context_id: cadence_core::ContextId,
    ) -> CadenceResult<Box<dyn Worker>> {
        let capability = self
            .registry
            .lookup(agent_id)
            .ok_or_else(|| RoutingError::UnknownAgent {
                agent_id: agent_id.to_string(),
            })?;
        if capability.availability == AgentAvailability::Offline {
            return Err(RoutingError::WorkerUnavailable {
                agent_id: agent_id.to_string(),
            }
            .into());
        }
        self.factory
            .resolve(agent_id, context_id)
            .ok_or_else(|| {
                RoutingError::WorkerUnavailable {
                    agent_id: agent_id.to_string(),
                }
                .into()
            })
    }

    /// Dispatch a handoff: check permissions, resolve the worker, invoke it
    /// under the timeout, and append the resulting entry to the ledger.
    pub fn dispatch(
        &self,
        from: &str,
        to: &str,
        task: &TaskContext,
        request: WorkerRequest,
    ) -> CadenceResult<DispatchOutcome> {
        self.check_route(from, to)?;
        let worker = self.resolve_worker(to, task.context_id)?;

        tracing::debug!(from = %from, to = %to, context_id = %task.context_id, "dispatching");
        let response = self.invoke_with_timeout(worker, to, task, request);
        let stored = self.append_response(to, from, task, &response)?;

        Ok(DispatchOutcome {
            entry: stored,
            response,
        })
    }

    /// Dispatch without a sending agent.
    ///
    /// Used by the orchestrator for the entry delegation of a fresh task
    /// and for re-entry after user input: permission edges govern
    /// agent-to-agent handoffs, and neither the orchestrator nor the user
    /// is an agent. The target must still exist and be available.
    pub fn dispatch_initial(
        &self,
        to: &str,
        task: &TaskContext,
        request: WorkerRequest,
    ) -> CadenceResult<DispatchOutcome> {
        let worker = self.resolve_worker(to, task.context_id)?;

        tracing::debug!(to = %to, context_id = %task.context_id, "dispatching (system)");
        let response = self.invoke_with_timeout(worker, to, task, request);
        let stored = self.append_response(to, "orchestrator", task, &response)?;

        Ok(DispatchOutcome {
            entry: stored,
            response,
        })
    }

    /// Seal a worker response into a ledger entry and append it.
    ///
    /// A `needs_input` response gets a `status` marker injected into its
    /// payload (if the worker did not set one) so the suspension is
    /// durable: projecting the ledger alone reproduces it. Payloads are
    /// opaque and need not be objects; a non-object payload is wrapped so
    /// the marker always lands.
    fn append_response(
        &self,
        agent_id: &str,
        trigger_source: &str,
        task: &TaskContext,
        response: &WorkerResponse,
    ) -> CadenceResult<ContextEntry> {
        let mut data = response.data.clone();
        if response.status == WorkerStatus::NeedsInput {
            match data.as_object_mut() {
                Some(fields) => {
                    fields
                        .entry("status".to_string())
                        .or_insert_with(|| serde_json::Value::String("needs_input".to_string()));
                }
                None => {
                    data = serde_json::json!({
                        "status": "needs_input",
                        "payload": data,
                    });
                }
            }
        }

        let entry = NewEntry::new(ActorRef::agent(agent_id), response.operation.clone())
            .with_data(data)
            .with_trigger(TriggerRef::new("dispatch").with_request_id(trigger_source));
        let entry = match &response.reasoning {
            Some(reasoning) => entry.with_reasoning(reasoning.clone()),
            None => entry,
        };
        self.ledger.append(task.context_id, entry)
    }

    fn check_route(&self, from: &str, to: &str) -> CadenceResult<()> {
        let sender = self
            .registry
            .lookup(from)
            .ok_or_else(|| RoutingError::UnknownAgent {
                agent_id: from.to_string(),
            })?;
        let receiver = self
            .registry
            .lookup(to)
            .ok_or_else(|| RoutingError::UnknownAgent {
                agent_id: to.to_string(),
            })?;

        if !sender.may_send_to(to) {
            tracing::warn!(from = %from, to = %to, "routing denied: sender edge missing");
            return Err(RoutingError::Denied {
                from: from.to_string(),
                to: to.to_string(),
                reason: format!("{from} does not declare {to} in can_send_to"),
            }
            .into());
        }
        if !receiver.may_receive_from(from) {
            tracing::warn!(from = %from, to = %to, "routing denied: receiver edge missing");
            return Err(RoutingError::Denied {
                from: from.to_string(),
                to: to.to_string(),
                reason: format!("{to} does not declare {from} in can_receive_from"),
            }
            .into());
        }
        Ok(())
    }

    /// Run the worker on a scratch thread and wait up to the timeout.
    ///
    /// A timeout, panic, or worker error is normalized to an error response
    /// whose operation carries the `_error` suffix, so it is appendable even
    /// to terminal contexts and the task stays resumable. A worker that
    /// finishes after the deadline has its result discarded; the append
    /// only ever happens on the dispatching thread.
    fn invoke_with_timeout(
        &self,
        mut worker: Box<dyn Worker>,
        agent_id: &str,
        task: &TaskContext,
        request: WorkerRequest,
    ) -> WorkerResponse {
        let (tx, rx) = mpsc::channel();
        let task_snapshot = task.clone();
        thread::spawn(move || {
            let result = worker.process(request, &task_snapshot);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(mut response)) => {
                if response.status == WorkerStatus::Error && !response.operation.ends_with("_error")
                {
                    response.operation.push_str("_error");
                }
                response
            }
            Ok(Err(error)) => {
                tracing::warn!(agent = %agent_id, %error, "worker failed");
                WorkerResponse::error(agent_id)
                    .with_data(serde_json::json!({"error": error.to_string()}))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let error = WorkerError::Timeout {
                    agent_id: agent_id.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                };
                tracing::warn!(agent = %agent_id, %error, "worker timed out");
                WorkerResponse::error(agent_id)
                    .with_data(serde_json::json!({"error": error.to_string()}))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::warn!(agent = %agent_id, "worker panicked");
                WorkerResponse::error(agent_id)
                    .with_data(serde_json::json!({"error": "worker panicked"}))
            }
        }
    }
}
