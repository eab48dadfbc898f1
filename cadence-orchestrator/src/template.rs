//! Task templates.
//!
//! A template is static configuration, loaded the same way as agent
//! descriptors: serde structs that reject unknown fields so typos fail at
//! load time.

use cadence_core::AgentId;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// REQUIREMENT URGENCY
// ============================================================================

/// Urgency of a capability requirement, ordered most-urgent-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequirementUrgency {
    /// Must be satisfied before the workflow can proceed
    #[default]
    Immediate,
    /// Needed eventually, the workflow can start without it
    CanDefer,
    /// Nice to have
    Optional,
}

impl RequirementUrgency {
    /// Stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementUrgency::Immediate => "immediate",
            RequirementUrgency::CanDefer => "can_defer",
            RequirementUrgency::Optional => "optional",
        }
    }

    /// All urgencies, most urgent first.
    pub const ORDERED: [RequirementUrgency; 3] = [
        RequirementUrgency::Immediate,
        RequirementUrgency::CanDefer,
        RequirementUrgency::Optional,
    ];
}

impl fmt::Display for RequirementUrgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// CAPABILITY REQUIREMENT
// ============================================================================

/// An external capability a template would ideally use (e.g. registry
/// lookup, document extraction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilityRequirement {
    /// Capability name, matched against the availability table
    pub name: String,
    /// How urgently a missing capability must be covered by the user
    #[serde(default)]
    pub urgency: RequirementUrgency,
}

impl CapabilityRequirement {
    /// Create a requirement with default (immediate) urgency.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            urgency: RequirementUrgency::default(),
        }
    }

    /// Set the urgency.
    pub fn with_urgency(mut self, urgency: RequirementUrgency) -> Self {
        self.urgency = urgency;
        self
    }
}

// ============================================================================
// TASK TEMPLATE
// ============================================================================

/// Static definition of a multi-step workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskTemplate {
    /// Template identifier (e.g. "llc_formation")
    pub template_id: String,
    /// Agent the orchestrator delegates to first
    pub entry_agent: AgentId,
    /// Fallback when a worker returns no next-agent hint
    #[serde(default)]
    pub default_next_agent: Option<AgentId>,
    /// Capabilities the template would ideally automate
    #[serde(default)]
    pub required_capabilities: Vec<CapabilityRequirement>,
    /// Top-level data keys that must be present before the task can be
    /// declared complete
    #[serde(default)]
    pub required_data_keys: Vec<String>,
}

impl TaskTemplate {
    /// Create a minimal template.
    pub fn new(template_id: impl Into<String>, entry_agent: impl Into<AgentId>) -> Self {
        Self {
            template_id: template_id.into(),
            entry_agent: entry_agent.into(),
            default_next_agent: None,
            required_capabilities: Vec::new(),
            required_data_keys: Vec::new(),
        }
    }

    /// Set the default next agent.
    pub fn with_default_next_agent(mut self, agent_id: impl Into<AgentId>) -> Self {
        self.default_next_agent = Some(agent_id.into());
        self
    }

    /// Add capability requirements.
    pub fn with_required_capabilities(mut self, requirements: Vec<CapabilityRequirement>) -> Self {
        self.required_capabilities = requirements;
        self
    }

    /// Add required data keys.
    pub fn with_required_data_keys(mut self, keys: Vec<String>) -> Self {
        self.required_data_keys = keys;
        self
    }

    /// Load a template from JSON.
    pub fn from_json(json: &str) -> Result<Self, cadence_core::ConfigError> {
        serde_json::from_str(json).map_err(|e| cadence_core::ConfigError::MalformedDescriptor {
            reason: e.to_string(),
        })
    }
}
