//! Policy Contract
//!
//! A policy observes a [`DecisionContext`] and picks one of the offered
//! actions. Concrete policies live in [`crate::policies`] or in domain crates.

use sim_types::{Action, TrajectoryStep, Value, WorldState};
use std::collections::BTreeMap;

use crate::error::SimError;

/// Everything a policy may look at when deciding.
///
/// Built fresh by the simulator for every decision and dropped right after.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub state: &'a WorldState,
    pub available_actions: &'a [Action],
    pub timestep: u64,
    /// Steps taken so far in this run, when the caller provides them
    pub history: Option<&'a [TrajectoryStep]>,
}

impl<'a> DecisionContext<'a> {
    pub fn new(state: &'a WorldState, available_actions: &'a [Action]) -> Self {
        Self {
            state,
            available_actions,
            timestep: state.timestep(),
            history: None,
        }
    }

    pub fn with_history(mut self, history: &'a [TrajectoryStep]) -> Self {
        self.history = Some(history);
        self
    }

    /// Finds an offered action by name.
    pub fn action_by_name(&self, name: &str) -> Option<&'a Action> {
        self.available_actions.iter().find(|a| a.name == name)
    }

    /// Shorthand for the state's variables.
    pub fn state_variables(&self) -> &'a BTreeMap<String, Value> {
        self.state.variables()
    }
}

/// A decision source.
///
/// Policies may keep per-run state between decisions, but must clear it in
/// [`reset`](Policy::reset). The swarm executor gives every world its own
/// clone, so no policy state is ever shared across worlds.
pub trait Policy {
    /// Display name, used in logs and error records.
    fn name(&self) -> &str;

    /// Picks an action from `ctx.available_actions`.
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<Action, SimError>;

    /// Clears per-run state.
    fn reset(&mut self) {}

    /// Decisions made since the last reset.
    fn decision_count(&self) -> u64;
}
