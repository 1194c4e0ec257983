//! World State
//!
//! Immutable snapshots of a simulated world. A state is never mutated in
//! place: every transition produces a fresh state through [`WorldState::evolve`].
//!
//! # Example
//!
//! ```
//! use sim_types::{StateUpdate, TerminalReason, Value, WorldState};
//!
//! let state = WorldState::from_variables(0, [("value", Value::Int(50))]);
//! let next = state.evolve(StateUpdate::new().set("value", 60).timestep(1));
//!
//! assert_eq!(state.get("value"), Some(&Value::Int(50)));
//! assert_eq!(next.get("value"), Some(&Value::Int(60)));
//! assert_eq!(next.timestep(), 1);
//!
//! let done = next.evolve(StateUpdate::new().terminal(TerminalReason::Success));
//! assert!(done.is_success());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::event::EventOccurrence;
use crate::value::Value;

/// Why a state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    Success,
    Failure,
    Timeout,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalReason::Success => "success",
            TerminalReason::Failure => "failure",
            TerminalReason::Timeout => "timeout",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TerminalReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(TerminalReason::Success),
            "failure" => Ok(TerminalReason::Failure),
            "timeout" => Ok(TerminalReason::Timeout),
            _ => Err(format!("unknown terminal reason: {}", s)),
        }
    }
}

/// Auxiliary data carried alongside the domain variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMetadata {
    /// Every event occurrence applied so far, in firing order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events_occurred: Vec<EventOccurrence>,
    /// Free-form domain annotations (e.g. a failure cause)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
}

impl StateMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with one more occurrence appended.
    pub fn with_occurrence(&self, occurrence: EventOccurrence) -> Self {
        let mut next = self.clone();
        next.events_occurred.push(occurrence);
        next
    }

    /// Returns a copy with an attribute set.
    pub fn with_attribute(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        next.attributes.insert(key.into(), value.into());
        next
    }
}

/// Immutable snapshot of the world at a point in time.
///
/// Terminality is stored as an optional reason, so a terminal state always
/// knows why it ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    timestep: u64,
    variables: BTreeMap<String, Value>,
    #[serde(rename = "terminal_reason")]
    terminal: Option<TerminalReason>,
    #[serde(default)]
    metadata: StateMetadata,
}

impl WorldState {
    /// Creates a non-terminal state with no variables.
    pub fn new(timestep: u64) -> Self {
        Self {
            timestep,
            variables: BTreeMap::new(),
            terminal: None,
            metadata: StateMetadata::default(),
        }
    }

    /// Creates a non-terminal state from key/value pairs.
    pub fn from_variables<K, V>(timestep: u64, variables: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            timestep,
            variables: variables
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            terminal: None,
            metadata: StateMetadata::default(),
        }
    }

    /// Sets the metadata of a freshly built state.
    pub fn with_metadata(mut self, metadata: StateMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Marks a freshly built state terminal.
    pub fn with_terminal(mut self, reason: TerminalReason) -> Self {
        self.terminal = Some(reason);
        self
    }

    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    /// Gets a variable from state.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Gets a numeric variable, or `None` if absent or not numeric.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.variables.get(key).and_then(Value::as_f64)
    }

    /// Gets a numeric variable with a default for absent or non-numeric values.
    pub fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_f64(key).unwrap_or(default)
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        self.terminal
    }

    pub fn is_success(&self) -> bool {
        self.terminal == Some(TerminalReason::Success)
    }

    pub fn is_failed(&self) -> bool {
        self.terminal == Some(TerminalReason::Failure)
    }

    pub fn metadata(&self) -> &StateMetadata {
        &self.metadata
    }

    /// Event occurrences recorded in metadata so far.
    pub fn events_occurred(&self) -> &[EventOccurrence] {
        &self.metadata.events_occurred
    }

    /// Creates a new state with the update applied.
    ///
    /// Variable updates are merged over a fresh copy of the current
    /// variables. Timestep, terminality and metadata are only replaced when
    /// the update sets them explicitly. `self` is left untouched.
    pub fn evolve(&self, update: StateUpdate) -> WorldState {
        let mut variables = self.variables.clone();
        variables.extend(update.variables);

        WorldState {
            timestep: update.timestep.unwrap_or(self.timestep),
            variables,
            terminal: update.terminal.unwrap_or(self.terminal),
            metadata: update.metadata.unwrap_or_else(|| self.metadata.clone()),
        }
    }
}

impl fmt::Display for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {}: {{", self.timestep)?;
        for (i, (key, value)) in self.variables.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// A set of overrides applied by [`WorldState::evolve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    variables: BTreeMap<String, Value>,
    timestep: Option<u64>,
    terminal: Option<Option<TerminalReason>>,
    metadata: Option<StateMetadata>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a domain variable.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Overrides the timestep.
    pub fn timestep(mut self, timestep: u64) -> Self {
        self.timestep = Some(timestep);
        self
    }

    /// Marks the evolved state terminal.
    pub fn terminal(mut self, reason: TerminalReason) -> Self {
        self.terminal = Some(Some(reason));
        self
    }

    /// Clears terminality on the evolved state.
    pub fn non_terminal(mut self) -> Self {
        self.terminal = Some(None);
        self
    }

    /// Replaces the metadata wholesale.
    pub fn metadata(mut self, metadata: StateMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// True if applying this update would copy the state unchanged.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.timestep.is_none()
            && self.terminal.is_none()
            && self.metadata.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_create_state() {
        let state = WorldState::from_variables(0, [("a", 1), ("b", 2)]);

        assert_eq!(state.timestep(), 0);
        assert_eq!(state.get("a"), Some(&Value::Int(1)));
        assert_eq!(state.get("b"), Some(&Value::Int(2)));
        assert!(!state.is_terminal());
        assert_eq!(state.terminal_reason(), None);
    }

    #[test]
    fn test_evolve_leaves_original_untouched() {
        let state = WorldState::from_variables(0, [("value", 10)]);
        let evolved = state.evolve(StateUpdate::new().set("value", 20));

        assert_eq!(state.get("value"), Some(&Value::Int(10)));
        assert_eq!(evolved.get("value"), Some(&Value::Int(20)));
        assert_eq!(evolved.timestep(), 0);
    }

    #[test]
    fn test_evolve_special_fields_only_when_set() {
        let meta = StateMetadata::new().with_attribute("cause", "test");
        let state = WorldState::new(3).with_metadata(meta.clone());

        let same = state.evolve(StateUpdate::new().set("x", 1.5));
        assert_eq!(same.timestep(), 3);
        assert_eq!(same.metadata(), &meta);
        assert!(!same.is_terminal());

        let moved = state.evolve(
            StateUpdate::new()
                .timestep(4)
                .terminal(TerminalReason::Failure)
                .metadata(StateMetadata::new()),
        );
        assert_eq!(moved.timestep(), 4);
        assert!(moved.is_failed());
        assert!(moved.metadata().attributes.is_empty());
    }

    #[test]
    fn test_terminal_states() {
        let success = WorldState::new(10).with_terminal(TerminalReason::Success);
        let failure = WorldState::new(5).with_terminal(TerminalReason::Failure);

        assert!(success.is_success());
        assert!(!success.is_failed());
        assert!(failure.is_failed());
        assert!(!failure.is_success());

        let reopened = failure.evolve(StateUpdate::new().non_terminal());
        assert!(!reopened.is_terminal());
    }

    #[test]
    fn test_get_f64_defaults() {
        let state = WorldState::from_variables(0, [("flag", Value::Bool(true))]);

        assert_eq!(state.get_f64("flag"), None);
        assert_eq!(state.get_f64_or("flag", 7.0), 7.0);
        assert_eq!(state.get_f64_or("missing", 0.0), 0.0);
    }

    #[test]
    fn test_terminal_reason_round_trip_names() {
        for reason in [TerminalReason::Success, TerminalReason::Failure, TerminalReason::Timeout] {
            assert_eq!(reason.to_string().parse::<TerminalReason>(), Ok(reason));
        }
        assert!("stuck".parse::<TerminalReason>().is_err());
    }

    #[test]
    fn test_state_display() {
        let state = WorldState::from_variables(2, [("b", 1), ("a", 2)]);
        assert_eq!(state.to_string(), "Step 2: {a: 2, b: 1}");
    }

    proptest! {
        #[test]
        fn prop_evolve_merges_exactly(
            base in proptest::collection::btree_map("[a-e]", -100i64..100, 0..5),
            updates in proptest::collection::btree_map("[a-h]", -100i64..100, 0..5),
        ) {
            let state = WorldState::from_variables(1, base.clone());
            let before = state.clone();

            let mut update = StateUpdate::new();
            for (k, v) in &updates {
                update = update.set(k.clone(), *v);
            }
            let evolved = state.evolve(update);

            prop_assert_eq!(&state, &before);

            let mut expected = base;
            expected.extend(updates);
            prop_assert_eq!(evolved.variables().len(), expected.len());
            for (k, v) in expected {
                prop_assert_eq!(evolved.get(&k), Some(&Value::Int(v)));
            }
            prop_assert_eq!(evolved.timestep(), 1);
            prop_assert!(!evolved.is_terminal());
        }
    }
}
