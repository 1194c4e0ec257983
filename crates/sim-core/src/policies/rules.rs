//! Rule-Based Policies
//!
//! A policy defined by explicit conditional rules. Rules are evaluated by
//! priority (highest first, insertion order among equals) and the first rule
//! that matches, and whose action is on offer, decides.
//!
//! # Example
//!
//! ```
//! use sim_core::policies::{always, state_gt, when, RuleBasedPolicy};
//!
//! let policy = RuleBasedPolicy::new(vec![
//!     when(state_gt("debt", 70.0))
//!         .named("high_debt_refactor")
//!         .with_priority(50)
//!         .then("REFACTOR"),
//!     when(always()).named("default_ship").then("SHIP_NOW"),
//! ]);
//! assert_eq!(policy.rules().len(), 2);
//! ```

use serde::{Deserialize, Serialize};
use sim_types::{Action, Value};
use std::cmp::Reverse;
use std::fmt;
use std::ops::Not;
use std::sync::Arc;

use super::{first_action, no_actions};
use crate::error::{RuleError, SimError};
use crate::policy::{DecisionContext, Policy};

type ConditionFn = dyn Fn(&DecisionContext<'_>) -> Result<bool, RuleError> + Send + Sync;

/// A predicate over a decision context.
///
/// Conditions may fail (e.g. a variable holds text where a number was
/// expected); what happens then is governed by [`RuleErrorMode`].
#[derive(Clone)]
pub struct Condition(Arc<ConditionFn>);

impl Condition {
    /// Wraps an infallible predicate.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&DecisionContext<'_>) -> bool + Send + Sync + 'static,
    {
        Condition::fallible(move |ctx| Ok(f(ctx)))
    }

    /// Wraps a predicate that can fail.
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(&DecisionContext<'_>) -> Result<bool, RuleError> + Send + Sync + 'static,
    {
        Condition(Arc::new(f))
    }

    pub fn evaluate(&self, ctx: &DecisionContext<'_>) -> Result<bool, RuleError> {
        (self.0)(ctx)
    }

    /// Both conditions, short-circuiting on the first `false` or error.
    pub fn and(self, other: Condition) -> Condition {
        Condition::fallible(move |ctx| Ok(self.evaluate(ctx)? && other.evaluate(ctx)?))
    }

    /// Either condition, short-circuiting on the first `true` or error.
    pub fn or(self, other: Condition) -> Condition {
        Condition::fallible(move |ctx| Ok(self.evaluate(ctx)? || other.evaluate(ctx)?))
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::fallible(move |ctx| self.evaluate(ctx).map(|b| !b))
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Condition(..)")
    }
}

/// Reads a numeric variable; absent counts as zero, non-numeric is an error.
fn numeric(ctx: &DecisionContext<'_>, key: &str) -> Result<f64, RuleError> {
    match ctx.state.get(key) {
        None => Ok(0.0),
        Some(value) => value.as_f64().ok_or_else(|| {
            RuleError::new(format!(
                "variable '{}' is {}, expected a number",
                key,
                value.type_name()
            ))
        }),
    }
}

/// Condition: `state[key] < value`
pub fn state_lt(key: impl Into<String>, value: f64) -> Condition {
    let key = key.into();
    Condition::fallible(move |ctx| Ok(numeric(ctx, &key)? < value))
}

/// Condition: `state[key] > value`
pub fn state_gt(key: impl Into<String>, value: f64) -> Condition {
    let key = key.into();
    Condition::fallible(move |ctx| Ok(numeric(ctx, &key)? > value))
}

/// Condition: `state[key] == value`; an absent variable never matches.
///
/// Integers and floats compare numerically.
pub fn state_eq(key: impl Into<String>, value: impl Into<Value>) -> Condition {
    let key = key.into();
    let expected = value.into();
    Condition::new(move |ctx| match (ctx.state.get(&key), expected.as_f64()) {
        (Some(actual), Some(n)) if actual.is_numeric() => actual.as_f64() == Some(n),
        (Some(actual), _) => *actual == expected,
        (None, _) => false,
    })
}

/// Condition: `low <= state[key] <= high`
pub fn state_between(key: impl Into<String>, low: f64, high: f64) -> Condition {
    let key = key.into();
    Condition::fallible(move |ctx| {
        let v = numeric(ctx, &key)?;
        Ok(low <= v && v <= high)
    })
}

/// Condition that always matches, for default rules.
pub fn always() -> Condition {
    Condition::new(|_| true)
}

/// A single decision rule: when `condition` holds, take `action_name`.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub condition: Condition,
    pub action_name: String,
    /// Higher priority rules are evaluated first
    pub priority: i32,
    pub description: String,
}

impl Rule {
    pub fn new(name: impl Into<String>, condition: Condition, action_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition,
            action_name: action_name.into(),
            priority: 0,
            description: String::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The rule's action, if it is on offer.
    pub fn action<'a>(&self, ctx: &DecisionContext<'a>) -> Option<&'a Action> {
        ctx.action_by_name(&self.action_name)
    }

    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            action: self.action_name.clone(),
            priority: self.priority,
        }
    }
}

/// Fluent rule construction, started by [`when`].
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    condition: Condition,
    name: String,
    priority: i32,
    description: String,
}

/// Starts building a rule from a condition.
pub fn when(condition: Condition) -> RuleBuilder {
    RuleBuilder {
        condition,
        name: "unnamed_rule".to_string(),
        priority: 0,
        description: String::new(),
    }
}

impl RuleBuilder {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn described_as(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Finishes the rule with the action to take.
    pub fn then(self, action_name: impl Into<String>) -> Rule {
        Rule {
            name: self.name,
            condition: self.condition,
            action_name: action_name.into(),
            priority: self.priority,
            description: self.description,
        }
    }
}

/// What to do when a rule condition fails to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleErrorMode {
    /// Log, record in [`RuleBasedPolicy::rule_errors`], treat as no match
    #[default]
    Swallow,
    /// Abort the decision with [`SimError::Rule`]
    Surface,
}

/// A swallowed condition failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleErrorRecord {
    pub rule: String,
    pub timestep: u64,
    pub message: String,
}

/// Serializable view of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSummary {
    pub name: String,
    pub description: String,
    pub action: String,
    pub priority: i32,
}

/// Why a rule-based policy would decide the way it does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionExplanation {
    /// Every rule whose condition holds, in evaluation order
    pub matching_rules: Vec<RuleSummary>,
    /// The first matching rule whose action is on offer
    pub selected_rule: Option<RuleSummary>,
    pub total_rules: usize,
}

/// Policy that decides by ordered rules.
///
/// If no rule applies, the fallback action is used when offered, and
/// otherwise the first available action.
#[derive(Debug, Clone)]
pub struct RuleBasedPolicy {
    name: String,
    rules: Vec<Rule>,
    fallback_action_name: Option<String>,
    error_mode: RuleErrorMode,
    last_matched_rule: Option<Rule>,
    rule_errors: Vec<RuleErrorRecord>,
    decisions: u64,
}

impl RuleBasedPolicy {
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut policy = Self {
            name: "RuleBasedPolicy".to_string(),
            rules,
            fallback_action_name: None,
            error_mode: RuleErrorMode::default(),
            last_matched_rule: None,
            rule_errors: Vec::new(),
            decisions: 0,
        };
        policy.sort_rules();
        policy
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_fallback(mut self, action_name: impl Into<String>) -> Self {
        self.fallback_action_name = Some(action_name.into());
        self
    }

    pub fn with_error_mode(mut self, mode: RuleErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn error_mode(&self) -> RuleErrorMode {
        self.error_mode
    }

    /// The rule that decided the last decision, if any did.
    pub fn last_matched_rule(&self) -> Option<&Rule> {
        self.last_matched_rule.as_ref()
    }

    /// Condition failures swallowed since the last reset.
    pub fn rule_errors(&self) -> &[RuleErrorRecord] {
        &self.rule_errors
    }

    /// Adds a rule and restores priority order.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
        self.sort_rules();
    }

    /// Removes every rule with this name. Returns true if any was removed.
    pub fn remove_rule(&mut self, name: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.name != name);
        self.rules.len() < before
    }

    /// Reports which rules match `ctx` without recording a decision.
    ///
    /// Conditions that fail to evaluate count as not matching.
    pub fn explain_decision(&self, ctx: &DecisionContext<'_>) -> DecisionExplanation {
        let matching: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.condition.evaluate(ctx).unwrap_or(false))
            .collect();

        DecisionExplanation {
            selected_rule: matching
                .iter()
                .find(|r| r.action(ctx).is_some())
                .map(|r| r.summary()),
            matching_rules: matching.iter().map(|r| r.summary()).collect(),
            total_rules: self.rules.len(),
        }
    }

    fn sort_rules(&mut self) {
        // stable: equal priorities keep insertion order
        self.rules.sort_by_key(|r| Reverse(r.priority));
    }
}

impl Policy for RuleBasedPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<Action, SimError> {
        if ctx.available_actions.is_empty() {
            return Err(no_actions(&self.name));
        }
        self.decisions += 1;
        self.last_matched_rule = None;

        for rule in &self.rules {
            match rule.condition.evaluate(ctx) {
                Ok(true) => {
                    if let Some(action) = rule.action(ctx) {
                        self.last_matched_rule = Some(rule.clone());
                        return Ok(action.clone());
                    }
                }
                Ok(false) => {}
                Err(err) => match self.error_mode {
                    RuleErrorMode::Swallow => {
                        tracing::warn!(
                            policy = %self.name,
                            rule = %rule.name,
                            timestep = ctx.timestep,
                            error = %err,
                            "rule condition failed, treating as no match"
                        );
                        self.rule_errors.push(RuleErrorRecord {
                            rule: rule.name.clone(),
                            timestep: ctx.timestep,
                            message: err.message,
                        });
                    }
                    RuleErrorMode::Surface => {
                        return Err(SimError::Rule {
                            rule: rule.name.clone(),
                            source: err,
                        });
                    }
                },
            }
        }

        if let Some(action) = self
            .fallback_action_name
            .as_deref()
            .and_then(|n| ctx.action_by_name(n))
        {
            return Ok(action.clone());
        }

        first_action(&self.name, ctx)
    }

    fn reset(&mut self) {
        self.decisions = 0;
        self.last_matched_rule = None;
        self.rule_errors.clear();
    }

    fn decision_count(&self) -> u64 {
        self.decisions
    }
}
