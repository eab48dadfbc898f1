//! The Capability Registry.
//!
//! `discover` runs once at process start, builds the permission graph from
//! static descriptors, and fails fast on anything malformed: a typo'd
//! routing target must stop the process, not silently drop an edge.

use cadence_core::{AgentCapability, AgentDescriptor, AgentId, ConfigError};
use std::collections::HashMap;

/// Static, discovered-once directory of agent identities, skills, and
/// directed permission edges. Read-only after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityRegistry {
    agents: HashMap<AgentId, AgentCapability>,
}

impl CapabilityRegistry {
    /// Build the registry from descriptors, validating the permission graph.
    ///
    /// Fails with `ConfigError` on an empty agent id, a duplicate id, or a
    /// `can_send_to`/`can_receive_from` reference to an unknown agent.
    pub fn discover(descriptors: Vec<AgentDescriptor>) -> Result<Self, ConfigError> {
        let mut agents: HashMap<AgentId, AgentCapability> = HashMap::new();
        for descriptor in descriptors {
            if descriptor.agent_id.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: "agent_id".to_string(),
                });
            }
            let capability = descriptor.into_capability();
            if agents.contains_key(&capability.agent_id) {
                return Err(ConfigError::DuplicateAgent {
                    agent_id: capability.agent_id,
                });
            }
            agents.insert(capability.agent_id.clone(), capability);
        }

        // Every routing edge must point at a known agent.
        for capability in agents.values() {
            for target in &capability.can_send_to {
                if !agents.contains_key(target) {
                    return Err(ConfigError::UnknownRouteTarget {
                        agent_id: capability.agent_id.clone(),
                        direction: "can_send_to".to_string(),
                        target: target.clone(),
                    });
                }
            }
            for source in &capability.can_receive_from {
                if !agents.contains_key(source) {
                    return Err(ConfigError::UnknownRouteTarget {
                        agent_id: capability.agent_id.clone(),
                        direction: "can_receive_from".to_string(),
                        target: source.clone(),
                    });
                }
            }
        }

        tracing::debug!(agents = agents.len(), "capability registry discovered");
        Ok(Self { agents })
    }

    /// Build the registry from a JSON array of descriptors.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let descriptors: Vec<AgentDescriptor> =
            serde_json::from_str(json).map_err(|e| ConfigError::MalformedDescriptor {
                reason: e.to_string(),
            })?;
        Self::discover(descriptors)
    }

    /// Look up one agent's capability record.
    pub fn lookup(&self, agent_id: &str) -> Option<&AgentCapability> {
        self.agents.get(agent_id)
    }

    /// Linear scan for agents declaring a skill containing `substr`.
    /// Diagnostic tooling only, not on the hot path.
    pub fn find_by_skill(&self, substr: &str) -> Vec<&AgentCapability> {
        let mut found: Vec<&AgentCapability> = self
            .agents
            .values()
            .filter(|c| c.skills.iter().any(|s| s.contains(substr)))
            .collect();
        found.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        found
    }

    /// Linear scan for agents whose role contains `substr`.
    pub fn find_by_role(&self, substr: &str) -> Vec<&AgentCapability> {
        let mut found: Vec<&AgentCapability> = self
            .agents
            .values()
            .filter(|c| c.role.contains(substr))
            .collect();
        found.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        found
    }

    /// All registered agent ids, sorted.
    pub fn agent_ids(&self) -> Vec<&AgentId> {
        let mut ids: Vec<&AgentId> = self.agents.keys().collect();
        ids.sort();
        ids
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether any agents are registered.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors() -> Vec<AgentDescriptor> {
        vec![
            AgentDescriptor::new("discovery")
                .with_role("finds the business record")
                .with_skills(vec!["registry_lookup".to_string()])
                .with_routing(vec![], vec!["profiler".to_string()]),
            AgentDescriptor::new("profiler")
                .with_role("collects the business profile")
                .with_skills(vec!["form_collection".to_string()])
                .with_routing(vec!["discovery".to_string()], vec!["compliance".to_string()]),
            AgentDescriptor::new("compliance")
                .with_role("identifies filing requirements")
                .with_skills(vec!["deadline_analysis".to_string()])
                .with_routing(vec!["profiler".to_string()], vec![]),
        ]
    }

    #[test]
    fn test_discover_builds_lookup() {
        let registry = CapabilityRegistry::discover(descriptors()).unwrap();
        assert_eq!(registry.len(), 3);
        let cap = registry.lookup("profiler").unwrap();
        assert!(cap.may_receive_from("discovery"));
        assert!(cap.may_send_to("compliance"));
        assert!(registry.lookup("ghost").is_none());
    }

    #[test]
    fn test_discover_rejects_duplicate_agent() {
        let mut ds = descriptors();
        ds.push(AgentDescriptor::new("discovery"));
        let err = CapabilityRegistry::discover(ds).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAgent { .. }));
    }

    #[test]
    fn test_discover_rejects_empty_agent_id() {
        let err = CapabilityRegistry::discover(vec![AgentDescriptor::new("  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
    }

    #[test]
    fn test_discover_rejects_unknown_send_target() {
        let ds = vec![AgentDescriptor::new("discovery")
            .with_routing(vec![], vec!["ghost".to_string()])];
        let err = CapabilityRegistry::discover(ds).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownRouteTarget {
                agent_id: "discovery".to_string(),
                direction: "can_send_to".to_string(),
                target: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_discover_rejects_unknown_receive_source() {
        let ds = vec![AgentDescriptor::new("discovery")
            .with_routing(vec!["ghost".to_string()], vec![])];
        let err = CapabilityRegistry::discover(ds).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRouteTarget { .. }));
    }

    #[test]
    fn test_from_json_roundtrip() {
        let json = r#"[
            {"agent_id": "discovery", "routing": {"can_send_to": ["profiler"]}},
            {"agent_id": "profiler", "routing": {"can_receive_from": ["discovery"]}}
        ]"#;
        let registry = CapabilityRegistry::from_json(json).unwrap();
        assert_eq!(registry.agent_ids(), vec!["discovery", "profiler"]);
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let err = CapabilityRegistry::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedDescriptor { .. }));
    }

    #[test]
    fn test_find_by_skill_and_role() {
        let registry = CapabilityRegistry::discover(descriptors()).unwrap();
        let by_skill = registry.find_by_skill("lookup");
        assert_eq!(by_skill.len(), 1);
        assert_eq!(by_skill[0].agent_id, "discovery");

        let by_role = registry.find_by_role("business");
        assert_eq!(by_role.len(), 2);
        assert!(registry.find_by_skill("nonexistent").is_empty());
    }
}
