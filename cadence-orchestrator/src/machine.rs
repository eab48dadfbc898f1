//! The orchestration state machine.
//!
//! Every run re-enters from the ledger: the orchestrator projects the
//! history, derives the orchestration state, and either dispatches the next
//! worker or stops. `AwaitingUserInput` is a durable state value derived
//! from the last entry's payload, so a task paused for days resumes exactly
//! where it left off with no in-process state.
//!
//! Run-local knowledge (a worker's next-agent hint) is used while the loop
//! is live but is never required for correctness: on resumption the machine
//! falls back to the ledger and the template's configured default.

use crate::assessor::{AutomationAssessor, AutomationLevel, AutomationPlan};
use crate::template::TaskTemplate;
use cadence_core::{
    ActorRef, ActorType, AgentId, CadenceResult, ContextEntry, ContextId, NewEntry, TaskContext,
    TaskState, TaskStatus, TriggerRef, UiRequest, WorkerRequest, WorkerStatus,
};
use cadence_ledger::ContextLedger;
use cadence_registry::{DispatchOutcome, Router};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// Cap on dispatches within one `run` call. A task needing more hops is
/// simply resumed with another call; the cap exists so a cyclic handoff
/// chain cannot spin forever.
pub const DEFAULT_MAX_HOPS: usize = 16;

// ============================================================================
// ORCHESTRATION STATE
// ============================================================================

/// Where a task sits in the orchestration lifecycle.
///
/// Always derived from the ledger, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationState {
    /// Created, no agent has acted yet
    Initiated,
    /// An agent holds the task
    Delegated(AgentId),
    /// Suspended until a user responds
    AwaitingUserInput,
    /// Terminal: workflow finished
    Completed,
    /// Terminal: unrecoverable failure recorded
    Failed,
}

impl OrchestrationState {
    /// Stable string tag for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestrationState::Initiated => "initiated",
            OrchestrationState::Delegated(_) => "delegated",
            OrchestrationState::AwaitingUserInput => "awaiting_user_input",
            OrchestrationState::Completed => "completed",
            OrchestrationState::Failed => "failed",
        }
    }

    /// Whether no further dispatch can ever happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestrationState::Completed | OrchestrationState::Failed
        )
    }
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derive the orchestration state from a projected snapshot and its history.
///
/// The holding agent for `Delegated` is the actor of the most recent
/// agent-authored entry; system and user entries never hold a task.
pub fn orchestration_state(state: &TaskState, history: &[ContextEntry]) -> OrchestrationState {
    match state.status {
        TaskStatus::Completed => OrchestrationState::Completed,
        TaskStatus::Failed => OrchestrationState::Failed,
        TaskStatus::NeedsInput => OrchestrationState::AwaitingUserInput,
        TaskStatus::Pending => OrchestrationState::Initiated,
        TaskStatus::Active => match last_agent(history) {
            Some(agent_id) => OrchestrationState::Delegated(agent_id),
            None => OrchestrationState::Initiated,
        },
    }
}

fn last_agent(history: &[ContextEntry]) -> Option<AgentId> {
    history
        .iter()
        .rev()
        .find(|e| e.actor.actor_type == ActorType::Agent)
        .map(|e| e.actor.id.clone())
}

// ============================================================================
// RUN REPORT
// ============================================================================

/// What one `run` call did and where it left the task.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Orchestration state at exit
    pub state: OrchestrationState,
    /// Projected task state at exit
    pub task_state: TaskState,
    /// Dispatches performed during this run
    pub hops: usize,
    /// Rendering requests collected from workers, in dispatch order
    pub ui_requests: Vec<UiRequest>,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Drives tasks through their phases, one dispatch at a time.
pub struct Orchestrator {
    ledger: Arc<ContextLedger>,
    router: Arc<Router>,
    assessor: AutomationAssessor,
    max_hops: usize,
}

impl Orchestrator {
    /// Create an orchestrator over a ledger, a router, and an assessor.
    pub fn new(ledger: Arc<ContextLedger>, router: Arc<Router>, assessor: AutomationAssessor) -> Self {
        Self {
            ledger,
            router,
            assessor,
            max_hops: DEFAULT_MAX_HOPS,
        }
    }

    /// Override the per-run hop cap.
    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Create a task from a template and record its automation plan.
    ///
    /// The plan is assessed once here, not per entry. A `guided` plan
    /// suspends the task immediately: the user must walk the issued steps
    /// before any agent acts. A `hybrid` plan records the batched user
    /// requests and lets automation proceed for the covered portion.
    pub fn initiate(
        &self,
        template: &TaskTemplate,
        tenant_id: impl Into<String>,
    ) -> CadenceResult<(TaskContext, AutomationPlan)> {
        let mut task = TaskContext::new(&template.template_id, tenant_id);
        let plan = self.assessor.assess(template);

        let entry = NewEntry::new(ActorRef::system("orchestrator"), "task_initiated")
            .with_data(json!({
                "template_id": template.template_id,
                "automation": plan,
            }))
            .with_trigger(TriggerRef::new("initiate"));
        self.ledger.append(task.context_id, entry)?;

        match &plan.level {
            AutomationLevel::FullyAutomated => {}
            AutomationLevel::Hybrid { request_groups } => {
                let entry =
                    NewEntry::new(ActorRef::system("orchestrator"), "user_requests_batched")
                        .with_data(json!({ "request_groups": request_groups }))
                        .with_trigger(TriggerRef::new("initiate"));
                self.ledger.append(task.context_id, entry)?;
            }
            AutomationLevel::Guided { steps } => {
                let entry = NewEntry::new(ActorRef::system("orchestrator"), "guided_steps_issued")
                    .with_data(json!({ "steps": steps, "status": "needs_input" }))
                    .with_trigger(TriggerRef::new("initiate"));
                self.ledger.append(task.context_id, entry)?;
            }
        }

        self.refresh(&mut task)?;
        tracing::info!(
            context_id = %task.context_id,
            template_id = %template.template_id,
            level = plan.level.as_str(),
            percentage = plan.percentage,
            "task initiated"
        );
        Ok((task, plan))
    }

    /// Rebuild a task handle from the ledger alone.
    ///
    /// This is the resumption entry point after a process restart: only the
    /// context id and the static template/tenant identity are needed.
    pub fn rehydrate(
        &self,
        context_id: ContextId,
        task_template_id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> CadenceResult<TaskContext> {
        let entries = self.ledger.read(context_id)?;
        let current_state = self.ledger.projector().project(&entries);
        let created_at = entries
            .first()
            .map(|e| e.timestamp)
            .unwrap_or_else(chrono::Utc::now);
        Ok(TaskContext {
            context_id,
            task_template_id: task_template_id.into(),
            tenant_id: tenant_id.into(),
            created_at,
            entries,
            current_state,
        })
    }

    /// Record a user's response on a suspended task.
    ///
    /// The append itself re-activates the task; a following `run` call
    /// re-enters the state machine and hands the input to the agent that
    /// asked for it.
    pub fn submit_user_input(
        &self,
        context_id: ContextId,
        user_id: &str,
        data: serde_json::Value,
    ) -> CadenceResult<ContextEntry> {
        let entry = NewEntry::new(ActorRef::user(user_id), "user_input_provided")
            .with_data(data)
            .with_trigger(TriggerRef::new("resume"));
        self.ledger.append(context_id, entry)
    }

    /// Run the state machine until the task suspends, terminates, or the
    /// hop cap is reached.
    ///
    /// Re-entrant: calling `run` again on the same context continues from
    /// whatever the ledger says, whether the previous run returned a minute
    /// or a month ago. A worker error ends the run with the failure
    /// recorded and the task still active.
    pub fn run(&self, template: &TaskTemplate, task: &mut TaskContext) -> CadenceResult<RunReport> {
        let mut hops = 0usize;
        let mut ui_requests = Vec::new();
        let mut live_hint: Option<AgentId> = None;

        loop {
            self.refresh(task)?;
            let state = orchestration_state(&task.current_state, &task.entries);
            if state.is_terminal() || state == OrchestrationState::AwaitingUserInput {
                break;
            }
            if hops >= self.max_hops {
                tracing::warn!(context_id = %task.context_id, hops, "hop cap reached, run stopped");
                break;
            }

            let Some(outcome) = self.step(template, task, live_hint.take())? else {
                // Nothing left to dispatch: the task stays active and
                // resumable.
                break;
            };
            hops += 1;
            ui_requests.extend(outcome.response.ui_requests.iter().cloned());

            match outcome.response.status {
                WorkerStatus::Error => {
                    // Recorded as a ledger entry already; user notification
                    // is the communication collaborator's job.
                    tracing::warn!(
                        context_id = %task.context_id,
                        operation = %outcome.entry.operation,
                        "worker step failed, task left resumable"
                    );
                    break;
                }
                WorkerStatus::Completed => {
                    live_hint = outcome.response.next_agent.clone();
                    if live_hint.is_none() {
                        if self.finalize_if_complete(template, task)? {
                            continue;
                        }
                        if template.default_next_agent.is_none() {
                            break;
                        }
                    }
                }
                WorkerStatus::Delegated | WorkerStatus::NeedsInput => {
                    live_hint = outcome.response.next_agent.clone();
                }
            }
        }

        self.refresh(task)?;
        let state = orchestration_state(&task.current_state, &task.entries);
        tracing::debug!(
            context_id = %task.context_id,
            state = %state,
            hops,
            "run finished"
        );
        Ok(RunReport {
            state,
            task_state: task.current_state.clone(),
            hops,
            ui_requests,
        })
    }

    /// Perform one dispatch, or `None` when no next agent can be named.
    fn step(
        &self,
        template: &TaskTemplate,
        task: &TaskContext,
        live_hint: Option<AgentId>,
    ) -> CadenceResult<Option<DispatchOutcome>> {
        let Some(current) = last_agent(&task.entries) else {
            // No agent has acted yet: delegate to the template's entry agent.
            let request = WorkerRequest::new(format!("begin {}", template.template_id))
                .with_context(task.current_state.data.clone());
            return self
                .router
                .dispatch_initial(&template.entry_agent, task, request)
                .map(Some);
        };

        if let Some(last) = task.last_entry() {
            if last.actor.actor_type == ActorType::User {
                // User responded: re-enter the agent that was waiting,
                // carrying the response payload.
                let request = WorkerRequest::new("resume with user input")
                    .with_data(last.data.clone())
                    .with_context(task.current_state.data.clone());
                return self
                    .router
                    .dispatch_initial(&current, task, request)
                    .map(Some);
            }
        }

        let Some(next) = live_hint.or_else(|| template.default_next_agent.clone()) else {
            return Ok(None);
        };
        let request = WorkerRequest::new(format!("continue {}", task.current_state.phase))
            .with_context(task.current_state.data.clone());
        self.router.dispatch(&current, &next, task, request).map(Some)
    }

    /// Append the terminal `workflow_completed` entry if every required
    /// data key is present. Returns whether the task is (now) terminal.
    fn finalize_if_complete(
        &self,
        template: &TaskTemplate,
        task: &TaskContext,
    ) -> CadenceResult<bool> {
        let state = self.ledger.project(task.context_id)?;
        if state.status.is_terminal() {
            return Ok(true);
        }
        let all_present = template
            .required_data_keys
            .iter()
            .all(|key| state.data_key(key).is_some());
        if !all_present {
            return Ok(false);
        }

        let entry = NewEntry::new(ActorRef::system("orchestrator"), "workflow_completed")
            .with_data(json!({ "status": "completed" }))
            .with_trigger(TriggerRef::new("finalize"));
        self.ledger.append(task.context_id, entry)?;
        tracing::info!(context_id = %task.context_id, "workflow completed");
        Ok(true)
    }

    /// Re-project the task handle from the ledger.
    fn refresh(&self, task: &mut TaskContext) -> CadenceResult<()> {
        task.entries = self.ledger.read(task.context_id)?;
        task.current_state = self.ledger.projector().project(&task.entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::new_entry_id;

    fn entry(actor: ActorRef, operation: &str, seq: u64) -> ContextEntry {
        ContextEntry {
            entry_id: new_entry_id(),
            sequence_number: seq,
            timestamp: chrono::Utc::now(),
            actor,
            operation: operation.to_string(),
            data: json!({}),
            reasoning: None,
            trigger: None,
        }
    }

    fn state_with(status: TaskStatus) -> TaskState {
        TaskState {
            status,
            ..TaskState::default()
        }
    }

    #[test]
    fn test_state_derivation_terminal_and_suspended() {
        let history = vec![entry(ActorRef::agent("profiler"), "profile_collected", 1)];
        assert_eq!(
            orchestration_state(&state_with(TaskStatus::Completed), &history),
            OrchestrationState::Completed
        );
        assert_eq!(
            orchestration_state(&state_with(TaskStatus::Failed), &history),
            OrchestrationState::Failed
        );
        assert_eq!(
            orchestration_state(&state_with(TaskStatus::NeedsInput), &history),
            OrchestrationState::AwaitingUserInput
        );
    }

    #[test]
    fn test_state_derivation_delegation_tracks_last_agent_entry() {
        assert_eq!(
            orchestration_state(&state_with(TaskStatus::Pending), &[]),
            OrchestrationState::Initiated
        );
        // System entries alone do not delegate.
        let history = vec![entry(ActorRef::system("orchestrator"), "task_initiated", 1)];
        assert_eq!(
            orchestration_state(&state_with(TaskStatus::Active), &history),
            OrchestrationState::Initiated
        );
        // The holding agent is the last agent actor, even when a user or
        // system entry follows it.
        let history = vec![
            entry(ActorRef::system("orchestrator"), "task_initiated", 1),
            entry(ActorRef::agent("discovery"), "business_found", 2),
            entry(ActorRef::agent("profiler"), "profile_started", 3),
            entry(ActorRef::user("user-7"), "user_input_provided", 4),
        ];
        assert_eq!(
            orchestration_state(&state_with(TaskStatus::Active), &history),
            OrchestrationState::Delegated("profiler".to_string())
        );
    }

    #[test]
    fn test_orchestration_state_tags() {
        assert_eq!(OrchestrationState::Initiated.as_str(), "initiated");
        assert_eq!(
            OrchestrationState::Delegated("x".to_string()).as_str(),
            "delegated"
        );
        assert!(OrchestrationState::Completed.is_terminal());
        assert!(OrchestrationState::Failed.is_terminal());
        assert!(!OrchestrationState::AwaitingUserInput.is_terminal());
    }
}
