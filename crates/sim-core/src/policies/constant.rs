//! Fixed-preference baseline.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sim_types::{Action, ActionType};
use std::fmt;
use std::str::FromStr;

use super::no_actions;
use crate::error::SimError;
use crate::policy::{DecisionContext, Policy};

/// What [`ConstantPolicy`] does when its preference is not on offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    #[default]
    First,
    Last,
    Random,
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::First => write!(f, "first"),
            Fallback::Last => write!(f, "last"),
            Fallback::Random => write!(f, "random"),
        }
    }
}

impl FromStr for Fallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first" => Ok(Fallback::First),
            "last" => Ok(Fallback::Last),
            "random" => Ok(Fallback::Random),
            _ => Err(format!("unknown fallback: {}", s)),
        }
    }
}

/// Always picks the same action when it can.
///
/// Preference order: the named action, then the first action of the
/// preferred type, then the fallback.
#[derive(Debug, Clone)]
pub struct ConstantPolicy {
    name: String,
    prefer_name: Option<String>,
    prefer_type: Option<ActionType>,
    fallback: Fallback,
    rng: SmallRng,
    decisions: u64,
}

impl Default for ConstantPolicy {
    fn default() -> Self {
        Self {
            name: "ConstantPolicy".to_string(),
            prefer_name: None,
            prefer_type: None,
            fallback: Fallback::First,
            rng: SmallRng::seed_from_u64(0),
            decisions: 0,
        }
    }
}

impl ConstantPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefers the action with this name.
    pub fn preferring(name: impl Into<String>) -> Self {
        Self::default().with_preferred_name(name)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_preferred_name(mut self, name: impl Into<String>) -> Self {
        self.prefer_name = Some(name.into());
        self
    }

    pub fn with_preferred_type(mut self, action_type: ActionType) -> Self {
        self.prefer_type = Some(action_type);
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Seeds the generator used by [`Fallback::Random`].
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }
}

impl Policy for ConstantPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<Action, SimError> {
        let actions = ctx.available_actions;
        if actions.is_empty() {
            return Err(no_actions(&self.name));
        }
        self.decisions += 1;

        if let Some(action) = self.prefer_name.as_deref().and_then(|n| ctx.action_by_name(n)) {
            return Ok(action.clone());
        }

        if let Some(action) = self
            .prefer_type
            .and_then(|t| actions.iter().find(|a| a.action_type == t))
        {
            return Ok(action.clone());
        }

        let idx = match self.fallback {
            Fallback::First => 0,
            Fallback::Last => actions.len() - 1,
            Fallback::Random => self.rng.gen_range(0..actions.len()),
        };
        Ok(actions[idx].clone())
    }

    fn reset(&mut self) {
        self.decisions = 0;
    }

    fn decision_count(&self) -> u64 {
        self.decisions
    }
}
