//! World Contract
//!
//! A world is a deterministic state machine with a stochastic layer on top.
//! Implementations own their random generator; `reset(seed)` must make all
//! subsequent randomness reproducible for that seed.

use sim_types::{Action, TerminalReason, WorldState};

use crate::error::SimError;

/// A domain simulation a policy can be evaluated against.
///
/// Only [`reset`](World::reset), [`initial_state`](World::initial_state),
/// [`step`](World::step) and [`available_actions`](World::available_actions)
/// are required; the stochastic and terminal layers default to no-ops.
pub trait World {
    /// Reseeds the world's generator and clears run-scoped state.
    fn reset(&mut self, seed: u64);

    /// State at timestep 0, pure given configuration and seed.
    fn initial_state(&self) -> WorldState;

    /// Deterministic transition for one action. No randomness here.
    fn step(&self, state: &WorldState, action: &Action) -> Result<WorldState, SimError>;

    /// Candidate actions for the next decision.
    ///
    /// An empty list ends the run without counting a step.
    fn available_actions(&self, state: &WorldState) -> Vec<Action>;

    /// Layers stochastic effects over the deterministic transition.
    fn apply_events(&mut self, state: WorldState) -> Result<WorldState, SimError> {
        Ok(state)
    }

    /// Tests domain win/lose conditions. Must pass terminal states through.
    fn check_terminal(&self, state: WorldState) -> Result<WorldState, SimError> {
        Ok(state)
    }

    /// Maps a state to a quality value, typically in `[0, 1]`.
    fn outcome_score(&self, state: &WorldState) -> f64 {
        match state.terminal_reason() {
            Some(TerminalReason::Success) => 1.0,
            Some(TerminalReason::Failure) => 0.0,
            _ => 0.5,
        }
    }

    /// Human-readable description of a state.
    fn describe_state(&self, state: &WorldState) -> String {
        state.to_string()
    }
}
