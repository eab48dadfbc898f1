//! The State Projector.
//!
//! A pure fold from a ledger (or any prefix of one) to a [`TaskState`].
//! No I/O, no randomness, no wall clock: `last_updated` is taken from the
//! folded entries' own timestamps, so replaying the same history always
//! yields the same state, byte for byte.
//!
//! What each operation does to the accumulator is declared up front in an
//! [`OperationEffects`] registry rather than inferred per agent: each tag
//! maps to an optional merge key, an optional completeness floor, an
//! optional status, and an optional phase label. Completeness folds with
//! `max`, making it monotone by construction.

use cadence_core::{ContextEntry, TaskState, TaskStatus};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// OPERATION EFFECTS
// ============================================================================

/// Declared effect of one operation tag on the projected state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationEffect {
    /// Top-level key the entry's payload merges under. `None` merges the
    /// payload's fields into the accumulator root.
    pub data_key: Option<String>,
    /// Minimum completeness after this operation (folded with `max`)
    pub completeness_floor: Option<u8>,
    /// Status this operation forces (entry payloads may still override)
    pub status: Option<TaskStatus>,
    /// Phase label this operation moves the task into
    pub phase: Option<String>,
}

impl OperationEffect {
    /// Effect that merges under a top-level key.
    pub fn merge_into(key: impl Into<String>) -> Self {
        Self {
            data_key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Set the completeness floor.
    pub fn with_completeness(mut self, floor: u8) -> Self {
        self.completeness_floor = Some(floor.min(100));
        self
    }

    /// Set the forced status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the phase label.
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }
}

/// Registry of `operation -> effect` rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationEffects {
    effects: HashMap<String, OperationEffect>,
}

impl OperationEffects {
    /// An empty registry: every operation falls back to a root merge with
    /// no completeness or status change.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register an effect for an operation tag.
    pub fn register(mut self, operation: impl Into<String>, effect: OperationEffect) -> Self {
        self.effects.insert(operation.into(), effect);
        self
    }

    /// Look up the effect for an operation, if declared.
    pub fn get(&self, operation: &str) -> Option<&OperationEffect> {
        self.effects.get(operation)
    }

    /// The default business-workflow rule set: discovery, profile
    /// collection, compliance requirements, then completion.
    pub fn workflow_defaults() -> Self {
        Self::empty()
            .register(
                "business_found",
                OperationEffect::merge_into("business")
                    .with_completeness(25)
                    .with_phase("discovery"),
            )
            .register(
                "profile_collection_completed",
                OperationEffect::merge_into("profile")
                    .with_completeness(50)
                    .with_phase("profile"),
            )
            .register(
                "requirements_identified",
                OperationEffect::merge_into("requirements")
                    .with_completeness(75)
                    .with_phase("compliance"),
            )
            .register(
                "workflow_completed",
                OperationEffect::default()
                    .with_status(TaskStatus::Completed)
                    .with_phase("celebration"),
            )
    }
}

// ============================================================================
// PROJECTOR
// ============================================================================

/// Folds ledger histories into task state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projector {
    effects: OperationEffects,
}

impl Projector {
    /// Create a projector with an explicit effects registry.
    pub fn new(effects: OperationEffects) -> Self {
        Self { effects }
    }

    /// Projector preloaded with the default workflow rules.
    pub fn workflow_default() -> Self {
        Self::new(OperationEffects::workflow_defaults())
    }

    /// Project the full history into a state snapshot.
    pub fn project(&self, history: &[ContextEntry]) -> TaskState {
        let mut state = TaskState::default();
        for entry in history {
            self.fold_entry(&mut state, entry);
        }
        state
    }

    /// Project the prefix `history[0..sequence_number]`.
    ///
    /// `project_at(h, h.len())` equals `project(h)` exactly, which is what
    /// makes replay-to-any-point debugging and resumption after arbitrary
    /// downtime safe.
    pub fn project_at(&self, history: &[ContextEntry], sequence_number: u64) -> TaskState {
        let k = (sequence_number as usize).min(history.len());
        self.project(&history[..k])
    }

    fn fold_entry(&self, state: &mut TaskState, entry: &ContextEntry) {
        let effect = self.effects.get(&entry.operation);

        // Merge the payload into the accumulator.
        match effect.and_then(|e| e.data_key.as_deref()) {
            Some(key) => {
                let root = as_object_mut(&mut state.data);
                let slot = root.entry(key.to_string()).or_insert(Value::Null);
                merge_value(slot, &entry.data);
            }
            None => {
                if let Value::Object(fields) = &entry.data {
                    let root = as_object_mut(&mut state.data);
                    for (k, v) in fields {
                        // "status" is a lifecycle signal, not payload.
                        if k == "status" {
                            continue;
                        }
                        let slot = root.entry(k.clone()).or_insert(Value::Null);
                        merge_value(slot, v);
                    }
                }
            }
        }

        // Status: terminal states are sticky; audit entries never re-open
        // business logic.
        if !state.status.is_terminal() {
            state.status = TaskStatus::Active;
            if let Some(s) = effect.and_then(|e| e.status) {
                state.status = s;
            }
            if let Some(s) = entry
                .data
                .get("status")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<TaskStatus>().ok())
            {
                state.status = s;
            }
        }

        // Completeness folds with max: monotone by construction. Reaching
        // a completed status counts as fully done.
        if let Some(floor) = effect.and_then(|e| e.completeness_floor) {
            state.completeness = state.completeness.max(floor.min(100));
        }
        if state.status == TaskStatus::Completed {
            state.completeness = 100;
        }

        if let Some(phase) = effect.and_then(|e| e.phase.as_deref()) {
            state.phase = phase.to_string();
        }

        state.last_updated = Some(entry.timestamp);
    }
}

/// Coerce the accumulator into an object, replacing any non-object value.
fn as_object_mut(value: &mut Value) -> &mut serde_json::Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(serde_json::Map::new());
    }
    value.as_object_mut().expect("coerced to object above")
}

/// Deep-merge `incoming` into `target`: objects merge key-wise, everything
/// else replaces.
fn merge_value(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(t), Value::Object(i)) => {
            for (k, v) in i {
                let slot = t.entry(k.clone()).or_insert(Value::Null);
                merge_value(slot, v);
            }
        }
        (t, i) => {
            *t = i.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{ActorRef, NewEntry};
    use serde_json::json;

    fn entry(seq: u64, operation: &str, data: Value) -> ContextEntry {
        NewEntry::new(ActorRef::agent("test"), operation)
            .with_data(data)
            .into_entry(seq, chrono::Utc::now())
    }

    fn happy_path() -> Vec<ContextEntry> {
        vec![
            entry(1, "business_found", json!({"name": "Acme LLC", "state": "DE"})),
            entry(2, "profile_collection_completed", json!({"ein": "12-3456789"})),
            entry(3, "requirements_identified", json!({"annual_report": {"due": "2027-03-01"}})),
            entry(4, "workflow_completed", json!({"status": "completed"})),
        ]
    }

    #[test]
    fn test_empty_history_projects_pending() {
        let p = Projector::workflow_default();
        let state = p.project(&[]);
        assert_eq!(state.status, TaskStatus::Pending);
        assert_eq!(state.completeness, 0);
        assert!(state.last_updated.is_none());
    }

    #[test]
    fn test_happy_path_scenario() {
        let p = Projector::workflow_default();
        let state = p.project(&happy_path());

        assert_eq!(state.status, TaskStatus::Completed);
        assert_eq!(state.completeness, 100);
        let data = state.data.as_object().unwrap();
        assert!(data.contains_key("business"));
        assert!(data.contains_key("profile"));
        assert!(data.contains_key("requirements"));
        assert_eq!(state.data["business"]["name"], json!("Acme LLC"));
    }

    #[test]
    fn test_prefix_consistency() {
        let p = Projector::workflow_default();
        let history = happy_path();
        for k in 1..=history.len() {
            let at = p.project_at(&history, k as u64);
            let direct = p.project(&history[..k]);
            assert_eq!(at, direct, "prefix {} diverged", k);
        }
        assert_eq!(p.project_at(&history, history.len() as u64), p.project(&history));
    }

    #[test]
    fn test_replay_is_deterministic() {
        let p = Projector::workflow_default();
        let history = happy_path();
        let a = p.project(&history);
        let b = p.project(&history);
        assert_eq!(a, b);
    }

    #[test]
    fn test_completeness_is_monotone_across_prefixes() {
        let p = Projector::workflow_default();
        let history = happy_path();
        let mut prev = 0u8;
        for k in 1..=history.len() {
            let c = p.project_at(&history, k as u64).completeness;
            assert!(c >= prev);
            prev = c;
        }
    }

    #[test]
    fn test_needs_input_suspends_and_resumes() {
        let p = Projector::workflow_default();
        let mut history = vec![
            entry(1, "business_found", json!({"name": "Acme"})),
            entry(2, "profile_form_requested", json!({"status": "needs_input"})),
        ];
        assert_eq!(p.project(&history).status, TaskStatus::NeedsInput);

        history.push(entry(3, "profile_collection_completed", json!({"ein": "12-3456789"})));
        let resumed = p.project(&history);
        assert_eq!(resumed.status, TaskStatus::Active);
        assert_eq!(resumed.completeness, 50);
    }

    #[test]
    fn test_unregistered_operation_merges_into_root() {
        let p = Projector::workflow_default();
        let history = vec![entry(1, "note_recorded", json!({"note": "call back Tuesday"}))];
        let state = p.project(&history);
        assert_eq!(state.data["note"], json!("call back Tuesday"));
        assert_eq!(state.completeness, 0);
    }

    #[test]
    fn test_terminal_status_is_sticky() {
        let p = Projector::workflow_default();
        let history = vec![
            entry(1, "workflow_completed", json!({"status": "completed"})),
            entry(2, "retention_audit", json!({"auditor": "ops"})),
        ];
        let state = p.project(&history);
        assert_eq!(state.status, TaskStatus::Completed);
        // Audit payloads still land in the merged view.
        assert_eq!(state.data["auditor"], json!("ops"));
    }

    #[test]
    fn test_repeated_operation_deep_merges() {
        let p = Projector::workflow_default();
        let history = vec![
            entry(1, "business_found", json!({"name": "Acme", "address": {"city": "Dover"}})),
            entry(2, "business_found", json!({"address": {"zip": "19901"}})),
        ];
        let state = p.project(&history);
        assert_eq!(state.data["business"]["name"], json!("Acme"));
        assert_eq!(state.data["business"]["address"]["city"], json!("Dover"));
        assert_eq!(state.data["business"]["address"]["zip"], json!("19901"));
    }

    #[test]
    fn test_last_updated_comes_from_entry_timestamps() {
        let p = Projector::workflow_default();
        let ts = chrono::Utc::now() - chrono::Duration::days(3);
        let history = vec![NewEntry::new(ActorRef::agent("test"), "business_found")
            .with_data(json!({"name": "Acme"}))
            .into_entry(1, ts)];
        let state = p.project(&history);
        // Three-day-old entry, three-day-old state: no wall clock involved.
        assert_eq!(state.last_updated, Some(ts));
    }
}
