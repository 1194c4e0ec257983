//! Uniform random baseline.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sim_types::Action;

use super::no_actions;
use crate::error::SimError;
use crate::policy::{DecisionContext, Policy};

/// Picks uniformly among the offered actions.
///
/// The generator is seeded once at construction and is deliberately left
/// alone by [`reset`](Policy::reset), so a sequence of runs stays
/// reproducible as a whole.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    name: String,
    rng: SmallRng,
    decisions: u64,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            name: "RandomPolicy".to_string(),
            rng: SmallRng::seed_from_u64(seed),
            decisions: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<Action, SimError> {
        if ctx.available_actions.is_empty() {
            return Err(no_actions(&self.name));
        }
        self.decisions += 1;
        let idx = self.rng.gen_range(0..ctx.available_actions.len());
        Ok(ctx.available_actions[idx].clone())
    }

    fn reset(&mut self) {
        self.decisions = 0;
    }

    fn decision_count(&self) -> u64 {
        self.decisions
    }
}
