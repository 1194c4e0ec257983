//! Software Project World
//!
//! One step is one week. Each decision moves progress, technical debt,
//! morale, budget and the open bug count; random events then disrupt the
//! team. The project succeeds at 100% progress and fails when the budget
//! runs out, morale collapses, or debt and bugs overwhelm it.

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sim_core::{EventGenerator, SimError, SimpleEventGenerator, World};
use sim_types::{Action, Event, EventError, StateUpdate, TerminalReason, WorldState};
use std::fmt;
use thiserror::Error;

use crate::actions::{project_actions, ProjectAction};
use crate::config::{ProjectConfig, ProjectConfigError};

pub const PROGRESS: &str = "progress";
pub const DEBT: &str = "debt";
pub const MORALE: &str = "morale";
pub const BUDGET: &str = "budget";
pub const BUGS: &str = "bugs";
pub const PRODUCTIVITY: &str = "productivity";

/// Metadata attribute naming why a project failed.
pub const FAILURE_CAUSE: &str = "failure_cause";

/// Why a project failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    BudgetExhausted,
    MoraleCollapse,
    TechnicalCollapse,
}

impl FailureCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCause::BudgetExhausted => "budget_exhausted",
            FailureCause::MoraleCollapse => "morale_collapse",
            FailureCause::TechnicalCollapse => "technical_collapse",
        }
    }

    pub fn all() -> [FailureCause; 3] {
        [
            FailureCause::BudgetExhausted,
            FailureCause::MoraleCollapse,
            FailureCause::TechnicalCollapse,
        ]
    }

    /// Cause recorded on a failed state, if any.
    pub fn of(state: &WorldState) -> Option<FailureCause> {
        let recorded = state.metadata().attributes.get(FAILURE_CAUSE)?.as_str()?;
        FailureCause::all().into_iter().find(|c| c.as_str() == recorded)
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectWorldError {
    #[error("invalid project config: {0}")]
    Config(#[from] ProjectConfigError),
    #[error("invalid project event: {0}")]
    Event(#[from] EventError),
}

/// A software project simulated week by week.
///
/// Build one with [`ProjectWorld::new`] and hand [`ProjectWorld::for_seed`]
/// to the swarm executor as its factory.
#[derive(Debug, Clone)]
pub struct ProjectWorld {
    config: ProjectConfig,
    rng: SmallRng,
    events: SimpleEventGenerator,
}

impl ProjectWorld {
    pub fn new(config: ProjectConfig) -> Result<Self, ProjectWorldError> {
        config.validate()?;
        Ok(Self {
            config,
            rng: SmallRng::seed_from_u64(0),
            events: project_events()?,
        })
    }

    /// A fresh copy of this world seeded with `seed`.
    pub fn for_seed(&self, seed: u64) -> Self {
        let mut world = self.clone();
        world.reset(seed);
        world
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn events(&self) -> &SimpleEventGenerator {
        &self.events
    }
}

/// The five disruptions a project can suffer, with their modifiers and
/// handlers attached.
pub fn project_events() -> Result<SimpleEventGenerator, EventError> {
    let events = vec![
        Event::builder("team_member_quits")
            .description("A team member quits unexpectedly")
            .probability(0.05)
            .severity(0.7)
            .irreversible()
            .cooldown(10)
            .build()?,
        Event::builder("scope_creep")
            .description("Stakeholder requests new features")
            .probability(0.08)
            .severity(0.4)
            .build()?,
        Event::builder("critical_bug_discovered")
            .description("A critical bug is discovered in production")
            .probability(0.03)
            .severity(0.8)
            .build()?,
        Event::builder("dependency_update_breaks")
            .description("A dependency update breaks the build")
            .probability(0.04)
            .severity(0.5)
            .cooldown(5)
            .build()?,
        Event::builder("morale_boost")
            .description("Team celebration or good news")
            .probability(0.05)
            .severity(0.3)
            .build()?,
    ];

    Ok(SimpleEventGenerator::new(events)
        .with_modifier("critical_bug_discovered", debt_modifier)
        .with_modifier("team_member_quits", morale_modifier)
        .with_handler("team_member_quits", handle_quit)
        .with_handler("scope_creep", handle_scope_creep)
        .with_handler("critical_bug_discovered", handle_critical_bug)
        .with_handler("dependency_update_breaks", handle_dependency_break)
        .with_handler("morale_boost", handle_morale_boost))
}

// More debt surfaces more bugs.
fn debt_modifier(state: &WorldState) -> f64 {
    1.0 + state.get_f64_or(DEBT, 0.0) / 100.0
}

// Unhappy teams lose people.
fn morale_modifier(state: &WorldState) -> f64 {
    let morale = state.get_f64_or(MORALE, 50.0);
    if morale < 30.0 {
        2.0
    } else if morale < 50.0 {
        1.5
    } else {
        1.0
    }
}

fn handle_quit(state: &WorldState, _event: &Event, _rng: &mut dyn RngCore) -> WorldState {
    state.evolve(
        StateUpdate::new()
            .set(MORALE, (state.get_f64_or(MORALE, 50.0) - 20.0).max(0.0))
            .set(PRODUCTIVITY, state.get_f64_or(PRODUCTIVITY, 1.0) * 0.75),
    )
}

fn handle_scope_creep(state: &WorldState, _event: &Event, _rng: &mut dyn RngCore) -> WorldState {
    state.evolve(
        StateUpdate::new()
            .set(PROGRESS, (state.get_f64_or(PROGRESS, 0.0) - 5.0).max(0.0))
            .set(MORALE, (state.get_f64_or(MORALE, 50.0) - 5.0).max(0.0)),
    )
}

fn handle_critical_bug(state: &WorldState, _event: &Event, _rng: &mut dyn RngCore) -> WorldState {
    state.evolve(
        StateUpdate::new()
            .set(BUGS, bugs(state) + 5)
            .set(MORALE, (state.get_f64_or(MORALE, 50.0) - 10.0).max(0.0)),
    )
}

fn handle_dependency_break(
    state: &WorldState,
    _event: &Event,
    _rng: &mut dyn RngCore,
) -> WorldState {
    state.evolve(
        StateUpdate::new()
            .set(PROGRESS, (state.get_f64_or(PROGRESS, 0.0) - 3.0).max(0.0))
            .set(DEBT, (state.get_f64_or(DEBT, 0.0) + 5.0).min(100.0)),
    )
}

fn handle_morale_boost(state: &WorldState, _event: &Event, _rng: &mut dyn RngCore) -> WorldState {
    state.evolve(
        StateUpdate::new().set(MORALE, (state.get_f64_or(MORALE, 50.0) + 10.0).min(100.0)),
    )
}

fn bugs(state: &WorldState) -> i64 {
    state.get_f64_or(BUGS, 0.0) as i64
}

impl World for ProjectWorld {
    fn reset(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
        self.events.reset();
    }

    fn initial_state(&self) -> WorldState {
        let c = &self.config;
        WorldState::new(0).evolve(
            StateUpdate::new()
                .set(PROGRESS, c.initial_progress)
                .set(DEBT, c.initial_debt)
                .set(MORALE, c.initial_morale)
                .set(BUDGET, c.initial_budget)
                .set(BUGS, c.initial_bugs)
                .set(PRODUCTIVITY, 1.0),
        )
    }

    fn step(&self, state: &WorldState, action: &Action) -> Result<WorldState, SimError> {
        let decision: ProjectAction = action
            .name
            .parse()
            .map_err(|_| SimError::UnknownAction(action.name.clone()))?;

        let progress = state.get_f64_or(PROGRESS, 0.0);
        let debt = state.get_f64_or(DEBT, 0.0);
        let morale = state.get_f64_or(MORALE, 50.0);
        let budget = state.get_f64_or(BUDGET, 100.0);
        let bugs = bugs(state);
        let productivity = state.get_f64_or(PRODUCTIVITY, 1.0);

        // 0.5 at zero morale, 1.0 at full morale
        let morale_factor = 0.5 + morale / 200.0;
        let base_progress = self.config.base_progress_rate * morale_factor * productivity;

        let effect = decision.effect(base_progress, debt, bugs);
        let mut bugs_delta = effect.bugs;
        if debt > self.config.debt_bug_threshold {
            bugs_delta += ((debt - self.config.debt_bug_threshold) / 20.0) as i64;
        }

        Ok(state.evolve(
            StateUpdate::new()
                .timestep(state.timestep() + 1)
                .set(PROGRESS, (progress + effect.progress).clamp(0.0, 100.0))
                .set(DEBT, (debt + effect.debt).clamp(0.0, 100.0))
                .set(MORALE, (morale + effect.morale).clamp(0.0, 100.0))
                .set(BUDGET, (budget + effect.budget).max(0.0))
                .set(BUGS, (bugs + bugs_delta).max(0))
                .set(PRODUCTIVITY, productivity * effect.productivity_factor),
        ))
    }

    fn available_actions(&self, _state: &WorldState) -> Vec<Action> {
        project_actions()
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

        if state.get_f64_or(PROGRESS, 0.0) >= 100.0 {
            return Ok(state.evolve(StateUpdate::new().terminal(TerminalReason::Success)));
        }

        let cause = if state.get_f64_or(BUDGET, 100.0) <= 0.0 {
            Some(FailureCause::BudgetExhausted)
        } else if state.get_f64_or(MORALE, 50.0) <= 0.0 {
            Some(FailureCause::MoraleCollapse)
        } else if state.get_f64_or(DEBT, 0.0) >= 90.0 && bugs(&state) >= 20 {
            Some(FailureCause::TechnicalCollapse)
        } else {
            None
        };

        Ok(match cause {
            Some(cause) => {
                let metadata = state.metadata().with_attribute(FAILURE_CAUSE, cause.as_str());
                state.evolve(
                    StateUpdate::new()
                        .terminal(TerminalReason::Failure)
                        .metadata(metadata),
                )
            }
            None => state,
        })
    }

    fn outcome_score(&self, state: &WorldState) -> f64 {
        let progress = state.get_f64_or(PROGRESS, 0.0);
        match state.terminal_reason() {
            Some(TerminalReason::Success) => {
                let budget = state.get_f64_or(BUDGET, 0.0);
                let morale = state.get_f64_or(MORALE, 50.0);
                let debt = state.get_f64_or(DEBT, 50.0);
                (0.7 + budget / 1000.0 + morale / 1000.0 - debt / 1000.0).min(1.0)
            }
            Some(TerminalReason::Failure) => progress / 100.0 * 0.3,
            _ => 0.3 + progress / 100.0 * 0.3,
        }
    }

    fn describe_state(&self, state: &WorldState) -> String {
        format!(
            "Week {}: Progress={:.0}%, Debt={:.0}, Morale={:.0}, Budget={:.0}, Bugs={}",
            state.timestep(),
            state.get_f64_or(PROGRESS, 0.0),
            state.get_f64_or(DEBT, 0.0),
            state.get_f64_or(MORALE, 0.0),
            state.get_f64_or(BUDGET, 0.0),
            bugs(state),
        )
    }
}
