//! Actions
//!
//! Descriptors for the choices a policy can make at a decision point.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

use crate::value::Value;

/// Broad category of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Continue the current path
    #[default]
    Proceed,
    /// Wait or defer
    Delay,
    /// Push harder
    Aggressive,
    /// Pull back
    Conservative,
    /// Spend resources
    Invest,
    /// Reduce scope or resources
    Cut,
    /// Change direction
    Pivot,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Proceed => "proceed",
            ActionType::Delay => "delay",
            ActionType::Aggressive => "aggressive",
            ActionType::Conservative => "conservative",
            ActionType::Invest => "invest",
            ActionType::Cut => "cut",
            ActionType::Pivot => "pivot",
        }
    }

    /// Returns all action type variants.
    pub fn all() -> &'static [ActionType] {
        &[
            ActionType::Proceed,
            ActionType::Delay,
            ActionType::Aggressive,
            ActionType::Conservative,
            ActionType::Invest,
            ActionType::Cut,
            ActionType::Pivot,
        ]
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown action type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action type: {0}")]
pub struct ParseActionTypeError(pub String);

impl FromStr for ActionType {
    type Err = ParseActionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::all()
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseActionTypeError(s.to_string()))
    }
}

/// An action a policy can take.
///
/// Two actions are equal iff their names match; the remaining fields are
/// descriptive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub name: String,
    /// Category of action
    #[serde(default)]
    pub action_type: ActionType,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Additional action-specific parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
    /// Resource cost of this action
    #[serde(default)]
    pub cost: f64,
    /// Risk level, expected in 0..=1 (higher is riskier)
    #[serde(default = "default_risk_level")]
    pub risk_level: f64,
}

fn default_risk_level() -> f64 {
    0.5
}

impl Action {
    /// Creates a `proceed` action with neutral risk.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action_type: ActionType::Proceed,
            description: String::new(),
            parameters: BTreeMap::new(),
            cost: 0.0,
            risk_level: default_risk_level(),
        }
    }

    pub fn with_type(mut self, action_type: ActionType) -> Self {
        self.action_type = action_type;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_risk(mut self, risk_level: f64) -> Self {
        self.risk_level = risk_level;
        self
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Action {}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_by_name() {
        let a = Action::new("ship").with_type(ActionType::Aggressive).with_cost(3.0);
        let b = Action::new("ship").with_type(ActionType::Delay);
        let c = Action::new("wait");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Action> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_defaults() {
        let action = Action::new("noop");
        assert_eq!(action.action_type, ActionType::Proceed);
        assert_eq!(action.risk_level, 0.5);
        assert_eq!(action.cost, 0.0);
    }

    #[test]
    fn test_action_type_parse() {
        assert_eq!("invest".parse::<ActionType>(), Ok(ActionType::Invest));
        assert_eq!("AGGRESSIVE".parse::<ActionType>(), Ok(ActionType::Aggressive));
        assert_eq!(
            "sideways".parse::<ActionType>(),
            Err(ParseActionTypeError("sideways".to_string()))
        );
    }

    #[test]
    fn test_serialization_shape() {
        let action = Action::new("cut").with_type(ActionType::Cut).with_parameter("amount", 10);
        let json = serde_json::to_value(&action).unwrap();

        assert_eq!(json["action_type"], "cut");
        assert_eq!(json["parameters"]["amount"], 10);

        let back: Action = serde_json::from_str(r#"{"name": "cut"}"#).unwrap();
        assert_eq!(back.risk_level, 0.5);
        assert_eq!(back, action);
    }
}
