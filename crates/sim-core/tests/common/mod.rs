//! Shared test world for the engine integration tests.

#![allow(dead_code)]

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use sim_core::{EventGenerator, SimError, SimpleEventGenerator, World};
use sim_types::{Action, ActionType, Event, StateUpdate, TerminalReason, WorldState};
use std::time::Duration;

/// A single numeric variable pushed around by actions and random shocks.
pub struct DriftWorld {
    rng: SmallRng,
    events: SimpleEventGenerator,
    seed: u64,
    /// Panic inside `step` when running this seed
    pub panic_on_seed: Option<u64>,
    /// Sleep inside `step` when running this seed
    pub stall_on_seed: Option<(u64, Duration)>,
}

impl DriftWorld {
    pub fn new(seed: u64) -> Self {
        let shock = Event::builder("shock")
            .description("Value drops sharply")
            .probability(0.2)
            .severity(0.8)
            .irreversible()
            .build()
            .unwrap();
        let windfall = Event::builder("windfall")
            .probability(0.1)
            .severity(0.2)
            .cooldown(3)
            .build()
            .unwrap();

        let events = SimpleEventGenerator::new(vec![shock, windfall])
            .with_handler("shock", |s: &WorldState, _e: &Event, _rng: &mut dyn RngCore| {
                s.evolve(StateUpdate::new().set("value", s.get_f64_or("value", 0.0) - 15.0))
            })
            .with_handler("windfall", |s: &WorldState, _e: &Event, _rng: &mut dyn RngCore| {
                s.evolve(StateUpdate::new().set("value", s.get_f64_or("value", 0.0) + 5.0))
            });

        Self {
            rng: SmallRng::seed_from_u64(seed),
            events,
            seed,
            panic_on_seed: None,
            stall_on_seed: None,
        }
    }

    pub fn panicking_on(mut self, seed: u64) -> Self {
        self.panic_on_seed = Some(seed);
        self
    }

    pub fn stalling_on(mut self, seed: u64, pause: Duration) -> Self {
        self.stall_on_seed = Some((seed, pause));
        self
    }
}

impl World for DriftWorld {
    fn reset(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
        self.events.reset();
    }

    fn initial_state(&self) -> WorldState {
        WorldState::from_variables(0, [("value", 50.0)])
    }

    fn step(&self, state: &WorldState, action: &Action) -> Result<WorldState, SimError> {
        if self.panic_on_seed == Some(self.seed) {
            panic!("world blew up on seed {}", self.seed);
        }
        if let Some((seed, pause)) = self.stall_on_seed {
            if seed == self.seed && state.timestep() == 0 {
                std::thread::sleep(pause);
            }
        }

        let delta = match action.name.as_str() {
            "up" => 10.0,
            "down" => -10.0,
            "hold" => 0.0,
            other => return Err(SimError::UnknownAction(other.to_string())),
        };
        Ok(state.evolve(
            StateUpdate::new()
                .set("value", state.get_f64_or("value", 0.0) + delta)
                .timestep(state.timestep() + 1),
        ))
    }

    fn available_actions(&self, _state: &WorldState) -> Vec<Action> {
        vec![
            Action::new("up").with_type(ActionType::Aggressive),
            Action::new("down").with_type(ActionType::Cut),
            Action::new("hold").with_type(ActionType::Delay),
        ]
    }

    fn apply_events(&mut self, state: WorldState) -> Result<WorldState, SimError> {
        let fired = self.events.sample_events(&state, &mut self.rng);
        let mut state = state;
        for event in &fired {
            state = self.events.apply_event(&state, event, &mut self.rng);
        }
        Ok(state)
    }

    fn check_terminal(&self, state: WorldState) -> Result<WorldState, SimError> {
        if state.is_terminal() {
            return Ok(state);
        }
        let value = state.get_f64_or("value", 0.0);
        if value >= 100.0 {
            Ok(state.evolve(StateUpdate::new().terminal(TerminalReason::Success)))
        } else if value <= 0.0 {
            Ok(state.evolve(StateUpdate::new().terminal(TerminalReason::Failure)))
        } else {
            Ok(state)
        }
    }
}
