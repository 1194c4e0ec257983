//! Project management strategies.
//!
//! Three rule-based leads with different appetites for risk. All of them
//! fall through to a default rule, so they always decide.

use serde::{Deserialize, Serialize};
use sim_core::policies::{always, state_gt, state_lt, when, Condition, RuleBasedPolicy};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::world::{BUDGET, BUGS, DEBT, MORALE, PROGRESS};

/// Ships at all costs, backing off only in a crisis.
pub fn aggressive() -> RuleBasedPolicy {
    RuleBasedPolicy::new(vec![
        when(state_lt(BUDGET, 20.0).and(state_lt(PROGRESS, 80.0)))
            .named("desperate_cut")
            .with_priority(100)
            .described_as("Cut scope when budget critically low")
            .then("CUT_SCOPE"),
        when(state_gt(BUGS, 15.0))
            .named("bug_crisis")
            .with_priority(90)
            .described_as("Fix bugs when they're overwhelming")
            .then("FIX_BUGS"),
        when(always())
            .named("default_ship")
            .described_as("Always prioritize shipping")
            .then("SHIP_NOW"),
    ])
    .with_name("AggressivePolicy")
}

/// Keeps the project healthy and only ships when conditions are good.
pub fn conservative() -> RuleBasedPolicy {
    RuleBasedPolicy::new(vec![
        when(state_gt(DEBT, 50.0))
            .named("manage_debt")
            .with_priority(100)
            .described_as("Keep debt under control")
            .then("REFACTOR"),
        when(state_lt(MORALE, 50.0))
            .named("manage_morale")
            .with_priority(90)
            .described_as("Invest in team when morale drops")
            .then("HIRE"),
        when(state_gt(BUGS, 5.0))
            .named("manage_bugs")
            .with_priority(80)
            .described_as("Keep bugs under control")
            .then("FIX_BUGS"),
        when(state_lt(DEBT, 40.0).and(state_gt(MORALE, 60.0)))
            .named("careful_ship")
            .with_priority(50)
            .described_as("Ship when conditions are good")
            .then("SHIP_NOW"),
        when(always())
            .named("default_delay")
            .described_as("Wait when uncertain")
            .then("DELAY"),
    ])
    .with_name("ConservativePolicy")
}

/// Pushes when behind schedule, firefights when something breaks.
pub fn balanced() -> RuleBasedPolicy {
    RuleBasedPolicy::new(vec![
        when(state_lt(MORALE, 30.0))
            .named("morale_emergency")
            .with_priority(100)
            .described_as("Emergency morale intervention")
            .then("HIRE"),
        when(state_lt(BUDGET, 15.0))
            .named("budget_emergency")
            .with_priority(95)
            .described_as("Emergency scope cut")
            .then("CUT_SCOPE"),
        when(state_gt(DEBT, 70.0))
            .named("high_debt")
            .with_priority(90)
            .described_as("Debt getting dangerous")
            .then("REFACTOR"),
        when(state_gt(BUGS, 10.0))
            .named("bug_problem")
            .with_priority(85)
            .described_as("Bugs need attention")
            .then("FIX_BUGS"),
        when(behind_schedule().and(state_lt(DEBT, 60.0)))
            .named("behind_schedule")
            .with_priority(70)
            .described_as("Need to catch up")
            .then("SHIP_NOW"),
        when(state_gt(MORALE, 50.0))
            .named("on_track")
            .with_priority(50)
            .described_as("Making good progress")
            .then("SHIP_NOW"),
        when(always())
            .named("default")
            .described_as("Default maintenance")
            .then("FIX_BUGS"),
    ])
    .with_name("BalancedPolicy")
}

/// Less than two points of progress per elapsed week.
fn behind_schedule() -> Condition {
    Condition::new(|ctx| ctx.state.get_f64_or(PROGRESS, 0.0) < ctx.timestep as f64 * 2.0)
}

/// The built-in strategies, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Aggressive,
    Conservative,
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown policy '{0}' (expected aggressive, conservative or balanced)")]
pub struct UnknownPolicy(pub String);

impl PolicyKind {
    pub fn all() -> [PolicyKind; 3] {
        [
            PolicyKind::Aggressive,
            PolicyKind::Conservative,
            PolicyKind::Balanced,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Aggressive => "aggressive",
            PolicyKind::Conservative => "conservative",
            PolicyKind::Balanced => "balanced",
        }
    }

    pub fn build(&self) -> RuleBasedPolicy {
        match self {
            PolicyKind::Aggressive => aggressive(),
            PolicyKind::Conservative => conservative(),
            PolicyKind::Balanced => balanced(),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyKind::all()
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPolicy(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::project_actions;
    use sim_core::{DecisionContext, Policy};
    use sim_types::{StateUpdate, WorldState};

    fn project(t: u64, progress: f64, debt: f64, morale: f64, budget: f64, bugs: i64) -> WorldState {
        WorldState::new(t).evolve(
            StateUpdate::new()
                .set(PROGRESS, progress)
                .set(DEBT, debt)
                .set(MORALE, morale)
                .set(BUDGET, budget)
                .set(BUGS, bugs),
        )
    }

    fn decide(policy: &mut RuleBasedPolicy, state: &WorldState) -> String {
        let actions = project_actions();
        let ctx = DecisionContext::new(state, &actions);
        policy.decide(&ctx).unwrap().name
    }

    #[test]
    fn test_aggressive() {
        let mut p = aggressive();
        assert_eq!(p.name(), "AggressivePolicy");
        assert_eq!(decide(&mut p, &project(1, 10.0, 10.0, 75.0, 90.0, 0)), "SHIP_NOW");
        assert_eq!(decide(&mut p, &project(1, 10.0, 10.0, 75.0, 90.0, 16)), "FIX_BUGS");
        assert_eq!(decide(&mut p, &project(1, 10.0, 10.0, 75.0, 19.0, 16)), "CUT_SCOPE");
        // nearly done: keep shipping on a thin budget
        assert_eq!(decide(&mut p, &project(1, 85.0, 10.0, 75.0, 19.0, 0)), "SHIP_NOW");
        assert_eq!(p.decision_count(), 4);
    }

    #[test]
    fn test_conservative() {
        let mut p = conservative();
        assert_eq!(decide(&mut p, &project(1, 10.0, 10.0, 75.0, 90.0, 0)), "SHIP_NOW");
        assert_eq!(decide(&mut p, &project(1, 10.0, 45.0, 75.0, 90.0, 0)), "DELAY");
        assert_eq!(decide(&mut p, &project(1, 10.0, 45.0, 75.0, 90.0, 6)), "FIX_BUGS");
        assert_eq!(decide(&mut p, &project(1, 10.0, 45.0, 40.0, 90.0, 6)), "HIRE");
        assert_eq!(decide(&mut p, &project(1, 10.0, 55.0, 40.0, 90.0, 6)), "REFACTOR");
        assert_eq!(p.last_matched_rule().map(|r| r.name.as_str()), Some("manage_debt"));
    }

    #[test]
    fn test_balanced_tracks_schedule() {
        let mut p = balanced();
        // week 10 with 15% done is behind
        assert_eq!(decide(&mut p, &project(10, 15.0, 10.0, 40.0, 90.0, 0)), "SHIP_NOW");
        assert_eq!(
            p.last_matched_rule().map(|r| r.name.as_str()),
            Some("behind_schedule")
        );
        // on schedule with low morale: maintenance
        assert_eq!(decide(&mut p, &project(10, 25.0, 10.0, 40.0, 90.0, 0)), "FIX_BUGS");
        assert_eq!(p.last_matched_rule().map(|r| r.name.as_str()), Some("default"));
        assert_eq!(decide(&mut p, &project(10, 25.0, 10.0, 60.0, 90.0, 0)), "SHIP_NOW");
    }

    #[test]
    fn test_balanced_emergencies_take_precedence() {
        let mut p = balanced();
        assert_eq!(decide(&mut p, &project(10, 0.0, 80.0, 20.0, 10.0, 20)), "HIRE");
        assert_eq!(decide(&mut p, &project(10, 0.0, 80.0, 35.0, 10.0, 20)), "CUT_SCOPE");
        assert_eq!(decide(&mut p, &project(10, 0.0, 80.0, 35.0, 50.0, 20)), "REFACTOR");
        assert_eq!(decide(&mut p, &project(10, 0.0, 65.0, 35.0, 50.0, 20)), "FIX_BUGS");
    }

    #[test]
    fn test_rules_sorted_by_priority() {
        let priorities: Vec<i32> = balanced().rules().iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![100, 95, 90, 85, 70, 50, 0]);
    }

    #[test]
    fn test_policy_kind_parse() {
        assert_eq!("Balanced".parse::<PolicyKind>(), Ok(PolicyKind::Balanced));
        assert_eq!(PolicyKind::Aggressive.build().name(), "AggressivePolicy");
        let err = "reckless".parse::<PolicyKind>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown policy 'reckless' (expected aggressive, conservative or balanced)"
        );
    }
}
