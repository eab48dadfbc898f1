//! Automation-level assessment.
//!
//! Before a task is delegated to its first worker, the assessor compares
//! the template's capability requirements against a static availability
//! table and picks the orchestration policy for the whole task. The plan
//! is computed once at (re)initiation and recorded in the ledger, never
//! re-evaluated per entry.

use crate::template::{CapabilityRequirement, RequirementUrgency, TaskTemplate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// POLICY THRESHOLDS
// ============================================================================

/// Below this availability percentage the task is guided step-by-step.
const GUIDED_THRESHOLD: u8 = 20;

// ============================================================================
// AVAILABILITY TABLE
// ============================================================================

/// Static table of external capabilities the deployment can automate.
///
/// Read-only after construction, shared freely across tasks.
#[derive(Debug, Clone, Default)]
pub struct CapabilityAvailability {
    available: HashSet<String>,
}

impl CapabilityAvailability {
    /// Empty table: nothing is automated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from capability names.
    pub fn from_capabilities(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            available: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the deployment can automate a capability.
    pub fn is_available(&self, name: &str) -> bool {
        self.available.contains(name)
    }

    /// Number of available capabilities.
    pub fn len(&self) -> usize {
        self.available.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}

// ============================================================================
// PLAN
// ============================================================================

/// Requirements the user must cover, batched by urgency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRequestGroup {
    /// Urgency shared by every requirement in the group
    pub urgency: RequirementUrgency,
    /// Capability names the user must supply manually
    pub requirements: Vec<String>,
}

/// Orchestration policy bucket selected for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum AutomationLevel {
    /// Every requirement is automatable; no user involvement needed
    FullyAutomated,
    /// Most requirements are automatable; the rest are batched into
    /// user-request groups ordered most-urgent-first
    Hybrid { request_groups: Vec<UserRequestGroup> },
    /// Too little is automatable; the user walks an explicit step list
    Guided { steps: Vec<String> },
}

impl AutomationLevel {
    /// Stable string tag for logging and ledger payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationLevel::FullyAutomated => "fully_automated",
            AutomationLevel::Hybrid { .. } => "hybrid",
            AutomationLevel::Guided { .. } => "guided",
        }
    }
}

/// The assessor's verdict for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationPlan {
    /// Template the plan was computed for
    pub template_id: String,
    /// Share of requirements the deployment can automate, 0-100
    pub percentage: u8,
    /// Selected orchestration policy
    pub level: AutomationLevel,
}

// ============================================================================
// ASSESSOR
// ============================================================================

/// Policy component deciding how much of a task runs unattended.
#[derive(Debug, Clone, Default)]
pub struct AutomationAssessor {
    availability: CapabilityAvailability,
}

impl AutomationAssessor {
    /// Create an assessor over an availability table.
    pub fn new(availability: CapabilityAvailability) -> Self {
        Self { availability }
    }

    /// The availability table this assessor consults.
    pub fn availability(&self) -> &CapabilityAvailability {
        &self.availability
    }

    /// Assess a template: compute the availability percentage and select
    /// the policy bucket.
    ///
    /// A template with no requirements is trivially fully automated.
    pub fn assess(&self, template: &TaskTemplate) -> AutomationPlan {
        let required = template.required_capabilities.len();
        if required == 0 {
            return AutomationPlan {
                template_id: template.template_id.clone(),
                percentage: 100,
                level: AutomationLevel::FullyAutomated,
            };
        }

        let missing: Vec<&CapabilityRequirement> = template
            .required_capabilities
            .iter()
            .filter(|req| !self.availability.is_available(&req.name))
            .collect();
        let available = required - missing.len();
        let percentage = ((available * 100) / required) as u8;

        let level = if missing.is_empty() {
            AutomationLevel::FullyAutomated
        } else if percentage >= GUIDED_THRESHOLD {
            AutomationLevel::Hybrid {
                request_groups: Self::batch_by_urgency(&missing),
            }
        } else {
            AutomationLevel::Guided {
                steps: Self::guided_steps(template, &missing),
            }
        };

        tracing::debug!(
            template_id = %template.template_id,
            percentage,
            level = level.as_str(),
            "automation assessed"
        );

        AutomationPlan {
            template_id: template.template_id.clone(),
            percentage,
            level,
        }
    }

    /// Batch missing requirements into groups ordered most-urgent-first.
    /// Urgencies with no missing requirement produce no group.
    fn batch_by_urgency(missing: &[&CapabilityRequirement]) -> Vec<UserRequestGroup> {
        RequirementUrgency::ORDERED
            .iter()
            .filter_map(|&urgency| {
                let requirements: Vec<String> = missing
                    .iter()
                    .filter(|req| req.urgency == urgency)
                    .map(|req| req.name.clone())
                    .collect();
                if requirements.is_empty() {
                    None
                } else {
                    Some(UserRequestGroup {
                        urgency,
                        requirements,
                    })
                }
            })
            .collect()
    }

    /// Explicit ordered instructions for a guided task, one per missing
    /// requirement, most urgent first.
    fn guided_steps(template: &TaskTemplate, missing: &[&CapabilityRequirement]) -> Vec<String> {
        let mut ordered: Vec<&&CapabilityRequirement> = missing.iter().collect();
        ordered.sort_by_key(|req| req.urgency);
        ordered
            .iter()
            .enumerate()
            .map(|(i, req)| {
                format!(
                    "Step {}: provide {} for {} manually",
                    i + 1,
                    req.name,
                    template.template_id
                )
            })
            .collect()
    }
}
