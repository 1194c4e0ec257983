//! Integration tests for the analyzers.
//!
//! The first half runs a real swarm over a small random-walk world and
//! checks the analyzers agree with each other; the second half checks
//! algebraic invariants over arbitrary populations.

use analysis::{
    AnalysisConfig, CollapseAnalyzer, DecisionDiagnostics, OutcomeCollector, RegretAnalyzer,
    SensitivityAnalyzer, SurvivalAnalyzer,
};
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use sim_core::policies::{always, state_lt, when, RuleBasedPolicy};
use sim_core::{
    EventGenerator, SimError, SimpleEventGenerator, SimulatorConfig, SwarmConfig, SwarmExecutor,
    SwarmResult, World,
};
use sim_types::{
    Action, ActionType, Event, EventOccurrence, Outcome, SimulationResult, StateUpdate,
    TerminalReason, WorldState,
};

/// Cash moves by a random amount each step; reaching 20 wins, 0 loses.
struct WalkWorld {
    rng: SmallRng,
    events: SimpleEventGenerator,
}

impl WalkWorld {
    fn new(seed: u64) -> Self {
        let crash = Event::builder("crash")
            .probability(0.05)
            .severity(0.9)
            .irreversible()
            .build()
            .unwrap();
        let events = SimpleEventGenerator::new(vec![crash]).with_handler(
            "crash",
            |s: &WorldState, _e: &Event, _rng: &mut dyn RngCore| {
                s.evolve(StateUpdate::new().set("cash", s.get_f64_or("cash", 0.0) - 4.0))
            },
        );
        Self {
            rng: SmallRng::seed_from_u64(seed),
            events,
        }
    }
}

impl World for WalkWorld {
    fn reset(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
        self.events.reset();
    }

    fn initial_state(&self) -> WorldState {
        WorldState::from_variables(0, [("cash", 10.0)])
    }

    fn step(&self, state: &WorldState, action: &Action) -> Result<WorldState, SimError> {
        let drift = match action.name.as_str() {
            "invest" => 1.0,
            "save" => 0.0,
            other => return Err(SimError::UnknownAction(other.to_string())),
        };
        Ok(state.evolve(
            StateUpdate::new()
                .set("cash", state.get_f64_or("cash", 0.0) + drift)
                .timestep(state.timestep() + 1),
        ))
    }

    fn available_actions(&self, _state: &WorldState) -> Vec<Action> {
        vec![
            Action::new("invest").with_type(ActionType::Invest),
            Action::new("save").with_type(ActionType::Conservative),
        ]
    }

    fn apply_events(&mut self, state: WorldState) -> Result<WorldState, SimError> {
        let noise: f64 = self.rng.gen_range(-3.0..3.0);
        let mut state = state.evolve(
            StateUpdate::new().set("cash", state.get_f64_or("cash", 0.0) + noise),
        );
        for event in self.events.sample_events(&state, &mut self.rng) {
            state = self.events.apply_event(&state, &event, &mut self.rng);
        }
        Ok(state)
    }

    fn check_terminal(&self, state: WorldState) -> Result<WorldState, SimError> {
        let cash = state.get_f64_or("cash", 0.0);
        if cash >= 20.0 {
            Ok(state.evolve(StateUpdate::new().terminal(TerminalReason::Success)))
        } else if cash <= 0.0 {
            Ok(state.evolve(StateUpdate::new().terminal(TerminalReason::Failure)))
        } else {
            Ok(state)
        }
    }
}

fn evaluate(n_worlds: usize) -> SwarmResult {
    let policy = RuleBasedPolicy::new(vec![
        when(state_lt("cash", 5.0)).named("protect").with_priority(10).then("save"),
        when(always()).named("grow").then("invest"),
    ])
    .with_name("Grower");

    let config = SwarmConfig::new(n_worlds)
        .unwrap()
        .with_base_seed(7)
        .with_max_workers(4)
        .with_progress(false);
    let mut swarm = SwarmExecutor::new(WalkWorld::new, config)
        .unwrap()
        .with_simulator(SimulatorConfig {
            max_steps: 40,
            record_full_trajectory: false,
        })
        .unwrap()
        .run(&policy);
    // Completion order varies; fix it so float sums match across evaluations
    swarm.results.sort_by_key(|r| r.seed);
    swarm
}

#[test]
fn test_analyzers_agree_on_real_swarm() {
    let swarm = evaluate(200);
    assert_eq!(swarm.successful_runs(), 200);
    let results = &swarm.results;

    let summary = OutcomeCollector::from_swarm(&swarm).summary();
    let collapse = CollapseAnalyzer::new(results, Some(40)).compute_metrics(None);
    assert_eq!(collapse.collapse_count, summary.failure_count);
    assert!((collapse.collapse_probability - summary.failure_rate).abs() < 1e-12);
    assert!((collapse.collapse_probability - swarm.failure_rate()).abs() < 1e-12);

    let curve = SurvivalAnalyzer::new(results).compute_survival_curve(0.95);
    assert!(curve.survival_prob.windows(2).all(|w| w[1] <= w[0]));
    assert_eq!(curve.events.iter().sum::<usize>(), summary.failure_count);
    assert_eq!(curve.at_risk.first().copied(), Some(200));

    let regret = RegretAnalyzer::new(results).outcome_regret();
    assert!(regret.mean_regret >= 0.0 && regret.max_regret <= 1.0);

    let report = SensitivityAnalyzer::new(results).full_report();
    assert!((0.0..=1.0).contains(&report.brittleness_score));
    assert!((report.brittleness_score + report.stability_score - 1.0).abs() < 1e-12);
}

#[test]
fn test_diagnostics_are_reproducible() {
    let first = DecisionDiagnostics::from_swarm_result(&evaluate(60));
    let second = DecisionDiagnostics::from_swarm_result(&evaluate(60));

    assert_ne!(first.evaluation_id, second.evaluation_id);
    assert_eq!(first.collapse_metrics, second.collapse_metrics);
    assert_eq!(first.survival_curve, second.survival_curve);
    assert_eq!(first.risk_profile, second.risk_profile);
}

#[test]
fn test_diagnostics_honour_config() {
    let swarm = evaluate(50);
    let config = AnalysisConfig::from_str(
        r#"
        [collapse]
        horizons = [3, 6]

        [regret]
        optimal_score = 2.0
        "#,
    )
    .unwrap();
    let diag = DecisionDiagnostics::from_swarm_result_with(&swarm, &config);

    assert_eq!(
        diag.collapse_metrics.collapse_by_horizon.keys().copied().collect::<Vec<_>>(),
        vec![3, 6]
    );
    assert!(diag.regret_distribution.mean_regret >= 1.0);
}

#[test]
fn test_irreversible_collapse_and_triggers() {
    let swarm = evaluate(300);
    let analyzer = CollapseAnalyzer::new(&swarm.results, None);
    let metrics = analyzer.compute_metrics(None);

    assert!(metrics.irreversible_collapse_rate <= metrics.collapse_probability);
    let crashed = analyzer.conditional_collapse(|r| r.had_event("crash"));
    assert!((0.0..=1.0).contains(&crashed));

    let triggers = analyzer.collapse_triggers();
    assert!(triggers.iter().all(|(name, _)| name == "crash"));
    assert!(triggers.windows(2).all(|w| w[0].1 >= w[1].1));
}

fn arb_result() -> impl Strategy<Value = SimulationResult> {
    (
        any::<u64>(),
        prop_oneof![
            Just(Outcome::Success),
            Just(Outcome::Failure),
            Just(Outcome::Timeout)
        ],
        0.0f64..=1.0,
        0u64..60,
        any::<bool>(),
    )
        .prop_map(|(seed, outcome, score, steps, irreversible)| SimulationResult {
            trajectory: Vec::new(),
            initial_state: WorldState::new(0),
            final_state: WorldState::new(steps).with_terminal(outcome),
            total_steps: steps,
            outcome,
            outcome_score: score,
            events_occurred: vec![EventOccurrence {
                name: "shock".to_string(),
                timestep: 0,
                severity: 0.5,
                is_irreversible: irreversible,
            }],
            seed,
            max_steps: 60,
        })
}

proptest! {
    #[test]
    fn test_brittleness_and_stability_are_complementary(
        results in prop::collection::vec(arb_result(), 0..40)
    ) {
        let report = SensitivityAnalyzer::new(&results).full_report();
        prop_assert!((0.0..=1.0).contains(&report.brittleness_score));
        prop_assert_eq!(report.brittleness_score + report.stability_score, 1.0);
    }

    #[test]
    fn test_collapse_rates_are_bounded(
        results in prop::collection::vec(arb_result(), 1..40),
        max_steps in prop::option::of(1u64..80)
    ) {
        let metrics = CollapseAnalyzer::new(&results, max_steps).compute_metrics(None);
        let failures = results.iter().filter(|r| r.is_failure()).count();

        prop_assert_eq!(metrics.collapse_count, failures);
        prop_assert!((metrics.collapse_probability - failures as f64 / results.len() as f64).abs() < 1e-12);
        prop_assert!(metrics.early_collapse_rate + metrics.late_collapse_rate <= metrics.collapse_probability + 1e-12);
        prop_assert!(metrics.irreversible_collapse_rate <= metrics.collapse_probability + 1e-12);

        let mut previous = 0.0;
        for rate in metrics.collapse_by_horizon.values() {
            prop_assert!(*rate >= previous && *rate <= metrics.collapse_probability + 1e-12);
            previous = *rate;
        }
    }

    #[test]
    fn test_survival_curve_is_monotone(
        results in prop::collection::vec(arb_result(), 0..40),
        t in 0u64..80
    ) {
        let curve = SurvivalAnalyzer::new(&results).compute_survival_curve(0.95);
        prop_assert!(curve.survival_prob.windows(2).all(|w| w[1] <= w[0]));
        let at = curve.survival_at(t);
        prop_assert!((0.0..=1.0).contains(&at));
        prop_assert!(at >= curve.final_survival());
        for i in 0..curve.len() {
            prop_assert!(curve.confidence_lower[i] <= curve.survival_prob[i] + 1e-12);
            prop_assert!(curve.confidence_upper[i] >= curve.survival_prob[i] - 1e-12);
        }
    }

    #[test]
    fn test_regret_bounds(results in prop::collection::vec(arb_result(), 1..40)) {
        let dist = RegretAnalyzer::new(&results).outcome_regret();
        prop_assert!(dist.mean_regret >= 0.0 && dist.mean_regret <= 1.0);
        prop_assert!(dist.median_regret <= dist.max_regret + 1e-12);
        for value in dist.regret_percentiles.values() {
            prop_assert!(*value <= dist.max_regret + 1e-12);
        }
        let cumulative = RegretAnalyzer::new(&results).cumulative_regret();
        if let Some(last) = cumulative.values().last() {
            prop_assert!((last - dist.mean_regret).abs() < 1e-9);
        }
    }
}
