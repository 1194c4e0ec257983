//! Project decisions.
//!
//! The six moves a team lead can make each week, and what each one does to
//! the project before morale, productivity and debt are factored in.

use serde::{Deserialize, Serialize};
use sim_types::{Action, ActionType};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectAction {
    ShipNow,
    Refactor,
    Hire,
    CutScope,
    FixBugs,
    Delay,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown project action: {0}")]
pub struct UnknownProjectAction(pub String);

impl ProjectAction {
    pub fn all() -> [ProjectAction; 6] {
        [
            ProjectAction::ShipNow,
            ProjectAction::Refactor,
            ProjectAction::Hire,
            ProjectAction::CutScope,
            ProjectAction::FixBugs,
            ProjectAction::Delay,
        ]
    }

    /// Name used on the wire and in policies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectAction::ShipNow => "SHIP_NOW",
            ProjectAction::Refactor => "REFACTOR",
            ProjectAction::Hire => "HIRE",
            ProjectAction::CutScope => "CUT_SCOPE",
            ProjectAction::FixBugs => "FIX_BUGS",
            ProjectAction::Delay => "DELAY",
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            ProjectAction::ShipNow => ActionType::Aggressive,
            ProjectAction::Refactor | ProjectAction::Hire => ActionType::Invest,
            ProjectAction::CutScope => ActionType::Cut,
            ProjectAction::FixBugs => ActionType::Conservative,
            ProjectAction::Delay => ActionType::Delay,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ProjectAction::ShipNow => "Rush to ship features, accumulating technical debt",
            ProjectAction::Refactor => "Spend time cleaning up code and reducing debt",
            ProjectAction::Hire => "Invest in hiring to increase team capacity",
            ProjectAction::CutScope => "Reduce project scope to accelerate delivery",
            ProjectAction::FixBugs => "Focus on fixing bugs and improving quality",
            ProjectAction::Delay => "Wait and plan before taking action",
        }
    }

    /// (cost, risk level)
    fn cost_and_risk(&self) -> (f64, f64) {
        match self {
            ProjectAction::ShipNow => (3.0, 0.7),
            ProjectAction::Refactor => (2.0, 0.2),
            ProjectAction::Hire => (8.0, 0.4),
            ProjectAction::CutScope => (1.0, 0.5),
            ProjectAction::FixBugs => (2.0, 0.2),
            ProjectAction::Delay => (1.0, 0.1),
        }
    }

    /// Engine-facing descriptor for this decision.
    pub fn to_action(&self) -> Action {
        let (cost, risk) = self.cost_and_risk();
        Action::new(self.as_str())
            .with_type(self.action_type())
            .with_description(self.description())
            .with_cost(cost)
            .with_risk(risk)
    }

    /// Immediate effect of the decision.
    ///
    /// `base_progress` is the week's progress at full focus; `debt` and
    /// `bugs` are the values going into the week.
    pub fn effect(&self, base_progress: f64, debt: f64, bugs: i64) -> ActionEffect {
        match self {
            ProjectAction::ShipNow => ActionEffect {
                progress: base_progress * 1.5,
                debt: 8.0,
                morale: -3.0,
                budget: -3.0,
                bugs: (debt / 20.0) as i64,
                productivity_factor: 1.0,
            },
            ProjectAction::Refactor => ActionEffect {
                progress: base_progress * 0.3,
                debt: -15.0,
                morale: 2.0,
                budget: -2.0,
                bugs: -3,
                productivity_factor: 1.0,
            },
            ProjectAction::Hire => ActionEffect {
                progress: base_progress * 0.5,
                debt: 2.0,
                morale: 5.0,
                budget: -8.0,
                bugs: 0,
                productivity_factor: 1.2,
            },
            ProjectAction::CutScope => ActionEffect {
                progress: base_progress * 0.8 + 10.0,
                debt: 3.0,
                morale: -5.0,
                budget: -1.0,
                bugs: 0,
                productivity_factor: 1.0,
            },
            ProjectAction::FixBugs => ActionEffect {
                progress: base_progress * 0.4,
                debt: -5.0,
                morale: 3.0,
                budget: -2.0,
                bugs: -(bugs / 2).max(5),
                productivity_factor: 1.0,
            },
            ProjectAction::Delay => ActionEffect {
                progress: base_progress * 0.2,
                debt: 0.0,
                morale: -2.0,
                budget: -1.0,
                bugs: 0,
                productivity_factor: 1.0,
            },
        }
    }
}

impl fmt::Display for ProjectAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectAction {
    type Err = UnknownProjectAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectAction::all()
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownProjectAction(s.to_string()))
    }
}

/// Deltas a decision applies to the project variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionEffect {
    pub progress: f64,
    pub debt: f64,
    pub morale: f64,
    pub budget: f64,
    pub bugs: i64,
    /// Multiplier on the team's lasting productivity
    pub productivity_factor: f64,
}

/// Every decision, in menu order.
pub fn project_actions() -> Vec<Action> {
    ProjectAction::all().iter().map(ProjectAction::to_action).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu() {
        let actions = project_actions();
        let names: Vec<&str> = actions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["SHIP_NOW", "REFACTOR", "HIRE", "CUT_SCOPE", "FIX_BUGS", "DELAY"]
        );
        assert_eq!(actions[0].action_type, ActionType::Aggressive);
        assert_eq!(actions[0].risk_level, 0.7);
        assert_eq!(actions[2].cost, 8.0);
    }

    #[test]
    fn test_parse() {
        assert_eq!("ship_now".parse::<ProjectAction>(), Ok(ProjectAction::ShipNow));
        assert_eq!("FIX_BUGS".parse::<ProjectAction>(), Ok(ProjectAction::FixBugs));
        assert!("PANIC".parse::<ProjectAction>().is_err());
    }

    #[test]
    fn test_fix_bugs_clears_at_least_five() {
        assert_eq!(ProjectAction::FixBugs.effect(5.0, 0.0, 2).bugs, -5);
        assert_eq!(ProjectAction::FixBugs.effect(5.0, 0.0, 30).bugs, -15);
    }

    #[test]
    fn test_shipping_breeds_bugs_from_debt() {
        let effect = ProjectAction::ShipNow.effect(4.0, 45.0, 0);
        assert_eq!(effect.progress, 6.0);
        assert_eq!(effect.bugs, 2);
    }

    #[test]
    fn test_hiring_raises_productivity() {
        assert_eq!(ProjectAction::Hire.effect(4.0, 0.0, 0).productivity_factor, 1.2);
        assert_eq!(ProjectAction::Delay.effect(4.0, 0.0, 0).productivity_factor, 1.0);
    }
}
