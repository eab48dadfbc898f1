//! CADENCE Orchestrator - Task State Machine and Automation Assessment
//!
//! Drives a task through its phases by reading worker responses, deciding
//! the next worker (or termination), and recording every decision back into
//! the ledger. Suspension is a durable state value derived from the ledger,
//! never an in-memory wait: the orchestrator holds zero retained state
//! between runs and tolerates arbitrarily long pauses.

pub mod assessor;
pub mod machine;
pub mod template;

pub use assessor::{
    AutomationAssessor, AutomationLevel, AutomationPlan, CapabilityAvailability, UserRequestGroup,
};
pub use machine::{orchestration_state, OrchestrationState, Orchestrator, RunReport};
pub use template::{CapabilityRequirement, RequirementUrgency, TaskTemplate};
