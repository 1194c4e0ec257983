//! Simulator
//!
//! Runs one policy through one world, recording the full trajectory.
//!
//! Each step is, in this fixed order: ask the world for actions, ask the
//! policy to decide, apply the deterministic transition, layer stochastic
//! events, check terminal conditions, record the step.

use sim_types::{
    EventOccurrence, Outcome, SimulationResult, StateUpdate, TerminalReason, TrajectoryStep,
    WorldState,
};

use crate::config::SimulatorConfig;
use crate::error::SimError;
use crate::policy::{DecisionContext, Policy};
use crate::world::World;

/// Default step limit before a run times out.
pub const DEFAULT_MAX_STEPS: u64 = 100;

/// Couples a world to a policy for complete runs.
#[derive(Debug)]
pub struct Simulator<W> {
    world: W,
    max_steps: u64,
    record_full_trajectory: bool,
}

impl<W: World> Simulator<W> {
    pub fn new(world: W) -> Self {
        Self {
            world,
            max_steps: DEFAULT_MAX_STEPS,
            record_full_trajectory: true,
        }
    }

    pub fn from_config(world: W, config: &SimulatorConfig) -> Self {
        Self {
            world,
            max_steps: config.max_steps,
            record_full_trajectory: config.record_full_trajectory,
        }
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Whether trajectory steps keep state snapshots.
    pub fn with_full_trajectory(mut self, record: bool) -> Self {
        self.record_full_trajectory = record;
        self
    }

    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn into_world(self) -> W {
        self.world
    }

    /// Runs a single simulation with the world reset to `seed`.
    ///
    /// Errors from the policy or the world are returned unchanged; isolating
    /// them is the caller's job.
    pub fn run<P>(&mut self, policy: &mut P, seed: u64) -> Result<SimulationResult, SimError>
    where
        P: Policy + ?Sized,
    {
        self.world.reset(seed);
        let initial_state = self.world.initial_state();
        let mut state = initial_state.clone();
        let mut trajectory: Vec<TrajectoryStep> = Vec::new();
        let mut all_events: Vec<EventOccurrence> = Vec::new();

        for step in 0..self.max_steps {
            if state.is_terminal() {
                break;
            }

            let available_actions = self.world.available_actions(&state);
            if available_actions.is_empty() {
                tracing::debug!(seed, step, "no actions available, stopping");
                break;
            }

            let ctx = DecisionContext::new(&state, &available_actions).with_history(&trajectory);
            let action = policy.decide(&ctx)?;

            let events_before = state.events_occurred().len();
            let state_before = self.record_full_trajectory.then(|| state.clone());
            let timestep = state.timestep();

            let next = self.world.step(&state, &action)?;
            let next = self.world.apply_events(next)?;
            let next = self.world.check_terminal(next)?;

            let events = new_events(events_before, &next);
            all_events.extend(events.iter().cloned());

            trajectory.push(TrajectoryStep {
                step,
                timestep,
                state_before,
                action,
                available_actions,
                events,
                state_after: self.record_full_trajectory.then(|| next.clone()),
            });
            state = next;
        }

        let final_state = match state.terminal_reason() {
            Some(_) => state,
            None => state.evolve(StateUpdate::new().terminal(TerminalReason::Timeout)),
        };
        let outcome: Outcome = final_state.terminal_reason().unwrap_or(TerminalReason::Timeout);
        let outcome_score = self.world.outcome_score(&final_state);

        tracing::debug!(
            seed,
            policy = policy.name(),
            steps = trajectory.len(),
            %outcome,
            score = outcome_score,
            "simulation finished"
        );

        Ok(SimulationResult {
            total_steps: trajectory.len() as u64,
            trajectory,
            initial_state,
            final_state,
            outcome,
            outcome_score,
            events_occurred: all_events,
            seed,
            max_steps: self.max_steps,
        })
    }
}

/// Occurrences appended to `after` beyond the first `before_len`.
fn new_events(before_len: usize, after: &WorldState) -> Vec<EventOccurrence> {
    after
        .events_occurred()
        .get(before_len..)
        .map(<[EventOccurrence]>::to_vec)
        .unwrap_or_default()
}
