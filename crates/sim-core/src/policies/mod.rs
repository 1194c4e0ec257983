//! Reference Policies
//!
//! Baselines and a rule engine that implement the [`Policy`](crate::Policy)
//! contract. Domain crates build their own strategies on top of these.

pub mod constant;
pub mod random;
pub mod rules;

pub use constant::{ConstantPolicy, Fallback};
pub use random::RandomPolicy;
pub use rules::{
    always, state_between, state_eq, state_gt, state_lt, when, Condition, DecisionExplanation, Rule,
    RuleBasedPolicy, RuleBuilder, RuleErrorMode, RuleErrorRecord, RuleSummary,
};

use sim_types::Action;

use crate::error::SimError;
use crate::policy::DecisionContext;

/// Error for a decision point that offers nothing to choose from.
pub(crate) fn no_actions(policy: &str) -> SimError {
    SimError::Policy {
        policy: policy.to_string(),
        message: "no actions available".to_string(),
    }
}

/// First offered action, or an error if there is none.
pub(crate) fn first_action(policy: &str, ctx: &DecisionContext<'_>) -> Result<Action, SimError> {
    ctx.available_actions
        .first()
        .cloned()
        .ok_or_else(|| no_actions(policy))
}
