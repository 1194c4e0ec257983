//! End-to-end policy evaluation.
//!
//! Runs one strategy across a swarm of seeded projects and folds the
//! results into diagnostics plus a breakdown of why projects failed.

use analysis::{DecisionDiagnostics, Grade, RiskLevel};
use serde::Serialize;
use sim_core::{ConfigError, SwarmExecutor, SwarmResult, WorldFailure};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

use crate::config::RobustnessConfig;
use crate::policies::PolicyKind;
use crate::world::{FailureCause, ProjectWorld, ProjectWorldError};

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    World(#[from] ProjectWorldError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// One policy's evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyEvaluation {
    pub policy: PolicyKind,
    pub diagnostics: DecisionDiagnostics,
    /// Failed runs per recorded cause
    pub failure_causes: BTreeMap<FailureCause, usize>,
    /// Worlds that produced no result
    pub world_errors: Vec<WorldFailure>,
    #[serde(skip)]
    pub swarm: SwarmResult,
}

impl PolicyEvaluation {
    /// Runs `policy` over the swarm described by `config`.
    pub fn run(policy: PolicyKind, config: &RobustnessConfig) -> Result<Self, EvaluationError> {
        let template = ProjectWorld::new(config.project.clone())?;
        let executor = SwarmExecutor::from_config(
            move |seed: u64| template.for_seed(seed),
            &config.evaluation(),
        )?;

        let mut swarm = executor.run(&policy.build());
        // completion order varies between runs
        swarm.results.sort_by_key(|r| r.seed);

        let mut failure_causes = BTreeMap::new();
        for result in swarm.results.iter().filter(|r| r.is_failure()) {
            if let Some(cause) = FailureCause::of(&result.final_state) {
                *failure_causes.entry(cause).or_insert(0) += 1;
            }
        }

        for failure in &swarm.errors {
            tracing::warn!(%policy, %failure, "world produced no result");
        }

        let diagnostics = DecisionDiagnostics::from_swarm_result_with(&swarm, &config.analysis);

        Ok(Self {
            policy,
            diagnostics,
            failure_causes,
            world_errors: swarm.errors.clone(),
            swarm,
        })
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.diagnostics.risk_profile.overall_risk_level
    }

    pub fn grade(&self) -> Grade {
        self.diagnostics.risk_profile.stability_grade
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Full plain-text report.
    pub fn report(&self) -> String {
        let mut out = self.diagnostics.to_string();
        if !self.failure_causes.is_empty() {
            let failures: usize = self.failure_causes.values().sum();
            let _ = writeln!(out);
            let _ = writeln!(out);
            let _ = writeln!(out, "FAILURE CAUSES");
            let _ = writeln!(out, "{}", "-".repeat(40));
            for (cause, count) in &self.failure_causes {
                let _ = writeln!(
                    out,
                    "  {}: {} ({:.1}%)",
                    cause,
                    count,
                    *count as f64 / failures as f64 * 100.0
                );
            }
        }
        if !self.world_errors.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{} worlds failed to run:", self.world_errors.len());
            for failure in self.world_errors.iter().take(5) {
                let _ = writeln!(out, "  {}", failure);
            }
        }
        out
    }
}

/// Evaluates every built-in policy under the same configuration.
pub fn compare_policies(config: &RobustnessConfig) -> Result<Vec<PolicyEvaluation>, EvaluationError> {
    PolicyKind::all()
        .into_iter()
        .map(|kind| PolicyEvaluation::run(kind, config))
        .collect()
}

/// One line per policy: success, failure, risk level and grade.
pub fn comparison_table(evaluations: &[PolicyEvaluation]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:>10} {:>10} {:>12} {:>6}",
        "Policy", "Success", "Failure", "Risk Level", "Grade"
    );
    let _ = writeln!(out, "{}", "-".repeat(62));
    for eval in evaluations {
        let summary = &eval.diagnostics.summary;
        let _ = writeln!(
            out,
            "{:<20} {:>9.1}% {:>9.1}% {:>12} {:>6}",
            eval.diagnostics.policy_name,
            summary.success_rate * 100.0,
            summary.failure_rate * 100.0,
            eval.risk_level().as_str().to_uppercase(),
            eval.grade().to_string(),
        );
    }
    out
}
