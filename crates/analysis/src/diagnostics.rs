//! Decision diagnostics.
//!
//! Runs every analyzer over one swarm and folds the results into a single
//! risk profile.

use serde::{Deserialize, Serialize};
use sim_core::SwarmResult;
use std::fmt;
use uuid::Uuid;

use crate::collapse::{CollapseAnalyzer, CollapseMetrics};
use crate::config::AnalysisConfig;
use crate::regret::{RegretAnalyzer, RegretDistribution};
use crate::sensitivity::{Grade, SensitivityAnalyzer, SensitivityReport};
use crate::stats;
use crate::survival::{SurvivalAnalyzer, SurvivalCurve};

/// Key risks shown in the text rendering.
const MAX_LISTED_RISKS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            RiskLevel::Critical
        } else if score >= 0.5 {
            RiskLevel::High
        } else if score >= 0.3 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condensed risk picture of one policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub failure_probability: f64,
    /// Share of the worst tenth of scores that fall below 0.5
    pub tail_risk: f64,
    /// Mean steps to failure, absent when nothing failed
    pub time_to_failure: Option<f64>,
    pub brittleness: f64,
    pub stability_grade: Grade,
    pub key_risks: Vec<String>,
    pub overall_risk_level: RiskLevel,
}

impl RiskProfile {
    pub fn from_metrics(
        swarm: &SwarmResult,
        collapse: &CollapseMetrics,
        sensitivity: &SensitivityReport,
    ) -> Self {
        let failure_probability = swarm.failure_rate();
        let brittleness = sensitivity.brittleness_score;
        let tail_risk = worst_decile_risk(&swarm.scores());

        let mut key_risks = Vec::new();
        if failure_probability > 0.5 {
            key_risks.push(format!(
                "High failure rate ({:.0}%)",
                failure_probability * 100.0
            ));
        }
        if brittleness > 0.6 {
            key_risks.push(format!("Brittle policy (score={:.2})", brittleness));
        }
        if collapse.early_collapse_rate > 0.2 {
            key_risks.push(format!(
                "Early collapse risk ({:.0}%)",
                collapse.early_collapse_rate * 100.0
            ));
        }
        if sensitivity.noise_sensitivity > 0.5 {
            key_risks.push(format!(
                "Noise sensitive (CV={:.2})",
                sensitivity.noise_sensitivity
            ));
        }

        let risk_score = (failure_probability + brittleness + tail_risk) / 3.0;

        Self {
            failure_probability,
            tail_risk,
            time_to_failure: collapse.mean_time_to_collapse,
            brittleness,
            stability_grade: Grade::from_stability(sensitivity.stability_score),
            key_risks,
            overall_risk_level: RiskLevel::from_score(risk_score),
        }
    }
}

/// Share of the worst `max(1, n / 10)` scores that are below 0.5.
fn worst_decile_risk(scores: &[f64]) -> f64 {
    let sorted = stats::sorted(scores);
    let n_tail = (sorted.len() / 10).max(1);
    let bad = sorted.iter().take(n_tail).filter(|&&s| s < 0.5).count();
    bad as f64 / n_tail as f64
}

const RULE: &str = "═══════════════════════════════════════";

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", RULE)?;
        writeln!(f, "           RISK PROFILE")?;
        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "  Overall Risk Level: {}",
            self.overall_risk_level.as_str().to_uppercase()
        )?;
        writeln!(f, "  Stability Grade: {}", self.stability_grade)?;
        writeln!(f)?;
        writeln!(
            f,
            "  Failure Probability: {:.1}%",
            self.failure_probability * 100.0
        )?;
        writeln!(f, "  Tail Risk (worst 10%): {:.1}%", self.tail_risk * 100.0)?;
        writeln!(f, "  Brittleness Score: {:.2}", self.brittleness)?;
        if let Some(ttf) = self.time_to_failure {
            writeln!(f, "  Mean Time to Failure: {:.1} steps", ttf)?;
        }
        if !self.key_risks.is_empty() {
            writeln!(f)?;
            writeln!(f, "  Key Risks:")?;
            for risk in self.key_risks.iter().take(MAX_LISTED_RISKS) {
                writeln!(f, "    ⚠ {}", risk)?;
            }
        }
        write!(f, "{}", RULE)
    }
}

/// Headline numbers of an evaluation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagnosticsSummary {
    pub total_runs: usize,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub timeout_rate: f64,
    pub mean_score: f64,
    pub execution_time: f64,
}

/// Every analyzer's output for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionDiagnostics {
    pub evaluation_id: Uuid,
    pub policy_name: String,
    pub survival_curve: SurvivalCurve,
    pub collapse_metrics: CollapseMetrics,
    pub regret_distribution: RegretDistribution,
    pub sensitivity_report: SensitivityReport,
    pub risk_profile: RiskProfile,
    pub summary: DiagnosticsSummary,
}

impl DecisionDiagnostics {
    /// Diagnoses a swarm with default analysis settings.
    pub fn from_swarm_result(swarm: &SwarmResult) -> Self {
        Self::from_swarm_result_with(swarm, &AnalysisConfig::default())
    }

    pub fn from_swarm_result_with(swarm: &SwarmResult, config: &AnalysisConfig) -> Self {
        let results = &swarm.results;

        let survival_curve =
            SurvivalAnalyzer::new(results).compute_survival_curve(config.survival.confidence_level);
        let collapse_metrics = CollapseAnalyzer::new(results, config.collapse.max_steps)
            .compute_metrics(config.collapse.horizons.as_deref());
        let regret_distribution = RegretAnalyzer::new(results)
            .with_optimal_score(config.regret.optimal_score)
            .outcome_regret();
        let sensitivity_report = SensitivityAnalyzer::new(results)
            .with_config(config.sensitivity.clone())
            .full_report();

        let risk_profile = RiskProfile::from_metrics(swarm, &collapse_metrics, &sensitivity_report);

        let summary = DiagnosticsSummary {
            total_runs: results.len(),
            success_rate: swarm.success_rate(),
            failure_rate: swarm.failure_rate(),
            timeout_rate: swarm.timeout_rate(),
            mean_score: stats::mean(&swarm.scores()),
            execution_time: swarm.total_time_seconds,
        };

        tracing::info!(
            policy = %swarm.policy_name,
            runs = summary.total_runs,
            risk_level = %risk_profile.overall_risk_level,
            grade = %risk_profile.stability_grade,
            "Diagnostics complete"
        );

        Self {
            evaluation_id: swarm.evaluation_id,
            policy_name: swarm.policy_name.clone(),
            survival_curve,
            collapse_metrics,
            regret_distribution,
            sensitivity_report,
            risk_profile,
            summary,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for DecisionDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.risk_profile)?;
        writeln!(f)?;
        writeln!(f, "SUMMARY ({})", self.policy_name)?;
        writeln!(f, "{}", "-".repeat(40))?;
        writeln!(f, "Total Runs: {}", self.summary.total_runs)?;
        writeln!(f, "Success Rate: {:.1}%", self.summary.success_rate * 100.0)?;
        writeln!(f, "Failure Rate: {:.1}%", self.summary.failure_rate * 100.0)?;
        writeln!(f, "Mean Score: {:.3}", self.summary.mean_score)?;
        writeln!(f, "Execution Time: {:.2}s", self.summary.execution_time)?;
        writeln!(f)?;
        writeln!(f, "{}", self.survival_curve)?;
        writeln!(f)?;
        writeln!(f, "{}", self.collapse_metrics)?;
        writeln!(f)?;
        writeln!(f, "{}", self.regret_distribution)?;
        writeln!(f)?;
        write!(f, "{}", self.sensitivity_report)
    }
}
