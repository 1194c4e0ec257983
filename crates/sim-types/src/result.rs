//! Simulation Results
//!
//! The immutable record a single simulation run leaves behind. Analyzers
//! consume these in bulk and need nothing else from the world or policy.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::event::EventOccurrence;
use crate::state::{TerminalReason, WorldState};

/// Final classification of a completed run.
///
/// A finished run is always terminal, so its outcome is exactly the terminal
/// reason of its final state.
pub type Outcome = TerminalReason;

/// One decision point in a run's trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStep {
    /// Zero-based index of the step within the run
    pub step: u64,
    /// World timestep at which the decision was made
    pub timestep: u64,
    /// State the policy observed (only kept with full recording)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_before: Option<WorldState>,
    /// Action the policy chose
    pub action: Action,
    /// Every action that was on offer
    pub available_actions: Vec<Action>,
    /// Event occurrences newly recorded during this step
    #[serde(default)]
    pub events: Vec<EventOccurrence>,
    /// State after transition, events and terminal check (only kept with full recording)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_after: Option<WorldState>,
}

/// Complete record of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub trajectory: Vec<TrajectoryStep>,
    pub initial_state: WorldState,
    pub final_state: WorldState,
    /// Number of recorded steps
    pub total_steps: u64,
    pub outcome: Outcome,
    /// Quality of the final state, typically in 0..=1
    pub outcome_score: f64,
    /// Every event occurrence across the run, in firing order
    pub events_occurred: Vec<EventOccurrence>,
    /// Seed the world was reset with
    pub seed: u64,
    /// Step limit the run was produced under
    pub max_steps: u64,
}

impl SimulationResult {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failure
    }

    pub fn is_timeout(&self) -> bool {
        self.outcome == Outcome::Timeout
    }

    /// Steps survived before the run ended (by failure or otherwise).
    pub fn survival_time(&self) -> u64 {
        self.total_steps
    }

    /// State observed at the given step, if full recording was enabled.
    pub fn state_at(&self, step: usize) -> Option<&WorldState> {
        self.trajectory.get(step).and_then(|s| s.state_before.as_ref())
    }

    /// Actions taken, in order.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.trajectory.iter().map(|s| &s.action)
    }

    /// True if an event with this name fired at any point in the run.
    pub fn had_event(&self, name: &str) -> bool {
        self.events_occurred.iter().any(|e| e.name == name)
    }

    /// True if any irreversible event fired during the run.
    pub fn had_irreversible_event(&self) -> bool {
        self.events_occurred.iter().any(|e| e.is_irreversible)
    }
}
