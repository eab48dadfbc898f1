//! Agent capability and descriptor types.
//!
//! Agents are declared in static descriptors read once at process start.
//! The descriptor's routing lists are directional permission edges: a
//! handoff from A to B requires B in A's `can_send_to` AND A in B's
//! `can_receive_from`.

use crate::AgentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// AVAILABILITY
// ============================================================================

/// Availability of an agent for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentAvailability {
    /// Ready to accept work
    #[default]
    Available,
    /// Accepting work with reduced capability
    Degraded,
    /// Not accepting work
    Offline,
}

impl AgentAvailability {
    /// Stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentAvailability::Available => "available",
            AgentAvailability::Degraded => "degraded",
            AgentAvailability::Offline => "offline",
        }
    }
}

impl fmt::Display for AgentAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentAvailability {
    type Err = AgentAvailabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(AgentAvailability::Available),
            "degraded" => Ok(AgentAvailability::Degraded),
            "offline" => Ok(AgentAvailability::Offline),
            _ => Err(AgentAvailabilityParseError(s.to_string())),
        }
    }
}

/// Error when parsing an invalid availability string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentAvailabilityParseError(pub String);

impl fmt::Display for AgentAvailabilityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid agent availability: {}", self.0)
    }
}

impl std::error::Error for AgentAvailabilityParseError {}

// ============================================================================
// CAPABILITY
// ============================================================================

/// An agent's declared identity, skills, and permission edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCapability {
    /// Symbolic agent identifier (e.g. "discovery", "compliance")
    pub agent_id: AgentId,
    /// Human-readable role description
    pub role: String,
    /// Skills this agent declares
    pub skills: Vec<String>,
    /// Agents permitted to hand off TO this agent
    pub can_receive_from: Vec<AgentId>,
    /// Agents this agent is permitted to hand off to
    pub can_send_to: Vec<AgentId>,
    /// Operation tags this agent may legitimately emit
    pub operations: Vec<String>,
    /// Current availability
    pub availability: AgentAvailability,
}

impl AgentCapability {
    /// Check if the agent declares a specific skill.
    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.iter().any(|s| s == skill)
    }

    /// Check if the agent may emit an operation tag.
    pub fn may_emit(&self, operation: &str) -> bool {
        self.operations.iter().any(|o| o == operation)
    }

    /// Check the outbound edge: may this agent send to `target`?
    pub fn may_send_to(&self, target: &str) -> bool {
        self.can_send_to.iter().any(|a| a == target)
    }

    /// Check the inbound edge: may this agent receive from `source`?
    pub fn may_receive_from(&self, source: &str) -> bool {
        self.can_receive_from.iter().any(|a| a == source)
    }
}

// ============================================================================
// DESCRIPTOR SCHEMA
// ============================================================================

/// Routing permission lists as declared in a descriptor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingSpec {
    /// Agents permitted to hand off to this one
    #[serde(default)]
    pub can_receive_from: Vec<AgentId>,
    /// Agents this one may hand off to
    #[serde(default)]
    pub can_send_to: Vec<AgentId>,
}

/// Static agent descriptor, the on-disk configuration schema.
///
/// Unknown fields are rejected so a typo in a descriptor fails discovery
/// instead of silently dropping a permission edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentDescriptor {
    /// Symbolic agent identifier
    pub agent_id: AgentId,
    /// Human-readable role description
    #[serde(default)]
    pub role: String,
    /// Declared skills
    #[serde(default)]
    pub skills: Vec<String>,
    /// Directional permission edges
    #[serde(default)]
    pub routing: RoutingSpec,
    /// Operation tags this agent may emit
    #[serde(default)]
    pub operations: Vec<String>,
    /// Availability, defaults to available
    #[serde(default)]
    pub availability: AgentAvailability,
}

impl AgentDescriptor {
    /// Create a minimal descriptor.
    pub fn new(agent_id: impl Into<AgentId>) -> Self {
        Self {
            agent_id: agent_id.into(),
            role: String::new(),
            skills: Vec::new(),
            routing: RoutingSpec::default(),
            operations: Vec::new(),
            availability: AgentAvailability::default(),
        }
    }

    /// Set the role description.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Add declared skills.
    pub fn with_skills(mut self, skills: Vec<String>) -> Self {
        self.skills = skills;
        self
    }

    /// Set the routing permission edges.
    pub fn with_routing(mut self, can_receive_from: Vec<AgentId>, can_send_to: Vec<AgentId>) -> Self {
        self.routing = RoutingSpec {
            can_receive_from,
            can_send_to,
        };
        self
    }

    /// Add emittable operation tags.
    pub fn with_operations(mut self, operations: Vec<String>) -> Self {
        self.operations = operations;
        self
    }

    /// Set availability.
    pub fn with_availability(mut self, availability: AgentAvailability) -> Self {
        self.availability = availability;
        self
    }

    /// Convert into the runtime capability record.
    pub fn into_capability(self) -> AgentCapability {
        AgentCapability {
            agent_id: self.agent_id,
            role: self.role,
            skills: self.skills,
            can_receive_from: self.routing.can_receive_from,
            can_send_to: self.routing.can_send_to,
            operations: self.operations,
            availability: self.availability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_roundtrip() {
        for av in [
            AgentAvailability::Available,
            AgentAvailability::Degraded,
            AgentAvailability::Offline,
        ] {
            let parsed: AgentAvailability = av.as_str().parse().unwrap();
            assert_eq!(av, parsed);
        }
    }

    #[test]
    fn test_descriptor_into_capability() {
        let cap = AgentDescriptor::new("discovery")
            .with_role("finds the business")
            .with_skills(vec!["registry_lookup".to_string()])
            .with_routing(vec![], vec!["profiler".to_string()])
            .with_operations(vec!["business_found".to_string()])
            .into_capability();

        assert_eq!(cap.agent_id, "discovery");
        assert!(cap.has_skill("registry_lookup"));
        assert!(cap.may_emit("business_found"));
        assert!(cap.may_send_to("profiler"));
        assert!(!cap.may_receive_from("profiler"));
    }

    #[test]
    fn test_descriptor_rejects_unknown_fields() {
        let json = r#"{"agent_id": "discovery", "skils": ["typo"]}"#;
        let parsed: Result<AgentDescriptor, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_descriptor_minimal_json() {
        let json = r#"{"agent_id": "celebration"}"#;
        let d: AgentDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.agent_id, "celebration");
        assert_eq!(d.availability, AgentAvailability::Available);
        assert!(d.routing.can_send_to.is_empty());
    }
}
