//! Robustness analytics over swarm results.
//!
//! Every analyzer borrows the runs of one evaluation and computes a
//! serializable metrics object:
//!
//! - [`survival`]: Kaplan-Meier survival curve and hazard rates
//! - [`collapse`]: failure probability, timing and trigger events
//! - [`regret`]: distance from the optimal score
//! - [`sensitivity`]: noise, initial-condition sensitivity and brittleness
//! - [`collector`]: outcome counts and value distributions
//! - [`diagnostics`]: all of the above folded into one risk profile

pub mod collapse;
pub mod collector;
pub mod config;
pub mod diagnostics;
pub mod regret;
pub mod sensitivity;
pub mod stats;
pub mod survival;

pub use collapse::{CollapseAnalyzer, CollapseMetrics};
pub use collector::{
    OutcomeCollector, OutcomeComparison, OutcomeDistribution, OutcomeSummary, TailRisk,
};
pub use config::{
    AnalysisConfig, AnalysisConfigError, CollapseConfig, RegretConfig, SensitivityConfig,
    SurvivalConfig,
};
pub use diagnostics::{DecisionDiagnostics, DiagnosticsSummary, RiskLevel, RiskProfile};
pub use regret::{CostlyRun, RegretAnalyzer, RegretDistribution};
pub use sensitivity::{
    Grade, OutcomeVariance, SensitivityAnalyzer, SensitivityComparison, SensitivityReport,
};
pub use survival::{SurvivalAnalyzer, SurvivalComparison, SurvivalCurve};

#[cfg(test)]
pub(crate) mod testutil {
    use sim_core::{SwarmConfig, SwarmResult};
    use sim_types::{
        Action, ActionType, EventOccurrence, Outcome, SimulationResult, TrajectoryStep, WorldState,
    };

    pub fn run(seed: u64, outcome: Outcome, score: f64, steps: u64) -> SimulationResult {
        SimulationResult {
            trajectory: Vec::new(),
            initial_state: WorldState::new(0),
            final_state: WorldState::new(steps).with_terminal(outcome),
            total_steps: steps,
            outcome,
            outcome_score: score,
            events_occurred: Vec::new(),
            seed,
            max_steps: 100,
        }
    }

    pub fn with_events(mut result: SimulationResult, events: &[(&str, bool)]) -> SimulationResult {
        for (i, (name, irreversible)) in events.iter().enumerate() {
            result.events_occurred.push(EventOccurrence {
                name: name.to_string(),
                timestep: i as u64,
                severity: 0.5,
                is_irreversible: *irreversible,
            });
        }
        result
    }

    pub fn with_actions(mut result: SimulationResult, actions: &[(&str, ActionType)]) -> SimulationResult {
        for (i, (name, action_type)) in actions.iter().enumerate() {
            result.trajectory.push(TrajectoryStep {
                step: i as u64,
                timestep: i as u64,
                state_before: None,
                action: Action::new(*name).with_type(*action_type),
                available_actions: Vec::new(),
                events: Vec::new(),
                state_after: None,
            });
        }
        result
    }

    pub fn with_initial(mut result: SimulationResult, key: &str, value: f64) -> SimulationResult {
        result.initial_state = WorldState::from_variables(0, [(key, value)]);
        result
    }

    pub fn swarm_of(results: Vec<SimulationResult>) -> SwarmResult {
        SwarmResult::new("test-policy", results, Vec::new(), SwarmConfig::default(), 0.5)
    }
}
