//! Sensitivity analysis.
//!
//! How much a fixed policy's outcomes move with the seed alone, with the
//! starting conditions, and how fragile the population looks overall.

use serde::{Deserialize, Serialize};
use sim_types::{SimulationResult, WorldState};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::SensitivityConfig;
use crate::stats;

/// Letter grade for a stability score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_stability(stability: f64) -> Self {
        if stability >= 0.8 {
            Grade::A
        } else if stability >= 0.6 {
            Grade::B
        } else if stability >= 0.4 {
            Grade::C
        } else if stability >= 0.2 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::A => "Very Stable",
            Grade::B => "Stable",
            Grade::C => "Moderate",
            Grade::D => "Sensitive",
            Grade::F => "Brittle",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(s)
    }
}

/// Spread of scores and run lengths.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutcomeVariance {
    pub score_variance: f64,
    pub score_std: f64,
    pub score_range: f64,
    pub survival_variance: f64,
    pub survival_std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub noise_sensitivity: f64,
    /// Filled only by parameter sweeps; empty for a single population
    pub parameter_sensitivity: BTreeMap<String, f64>,
    pub initial_condition_sensitivity: f64,
    /// 0 (robust) to 1 (fragile)
    pub brittleness_score: f64,
    /// Always `1 - brittleness_score`
    pub stability_score: f64,
    pub details: OutcomeVariance,
}

impl SensitivityReport {
    pub fn grade(&self) -> Grade {
        Grade::from_stability(self.stability_score)
    }
}

impl fmt::Display for SensitivityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grade = self.grade();
        writeln!(f, "Sensitivity Analysis:")?;
        writeln!(f, "  Brittleness Score: {:.3}", self.brittleness_score)?;
        writeln!(
            f,
            "  Stability Score: {:.3} ({} ({}))",
            self.stability_score,
            grade,
            grade.label()
        )?;
        writeln!(f, "  Noise Sensitivity: {:.3}", self.noise_sensitivity)?;
        write!(
            f,
            "  Initial Condition Sensitivity: {:.3}",
            self.initial_condition_sensitivity
        )?;
        if !self.parameter_sensitivity.is_empty() {
            write!(f, "\n  Parameter Sensitivity:")?;
            let mut params: Vec<_> = self.parameter_sensitivity.iter().collect();
            params.sort_by(|a, b| b.1.total_cmp(a.1));
            for (param, sens) in params {
                write!(f, "\n    {}: {:.3}", param, sens)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityComparison {
    /// Ours minus theirs
    pub brittleness_diff: f64,
    pub stability_diff: f64,
    pub noise_sensitivity_diff: f64,
    pub ours_more_stable: bool,
    pub ours: SensitivityReport,
    pub theirs: SensitivityReport,
}

pub struct SensitivityAnalyzer<'a> {
    results: &'a [SimulationResult],
    config: SensitivityConfig,
}

impl<'a> SensitivityAnalyzer<'a> {
    pub fn new(results: &'a [SimulationResult]) -> Self {
        Self {
            results,
            config: SensitivityConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SensitivityConfig) -> Self {
        self.config = config;
        self
    }

    fn scores(&self) -> Vec<f64> {
        self.results.iter().map(|r| r.outcome_score).collect()
    }

    /// Coefficient of variation of the scores (plain std when the mean is
    /// not positive). Zero for fewer than two runs.
    pub fn noise_sensitivity(&self) -> f64 {
        if self.results.len() < 2 {
            return 0.0;
        }
        let scores = self.scores();
        let mean = stats::mean(&scores);
        let std = stats::std_dev(&scores);
        if mean > 0.0 {
            std / mean
        } else {
            std
        }
    }

    pub fn outcome_variance(&self) -> OutcomeVariance {
        if self.results.is_empty() {
            return OutcomeVariance::default();
        }
        let scores = self.scores();
        let lengths: Vec<f64> = self.results.iter().map(|r| r.total_steps as f64).collect();
        OutcomeVariance {
            score_variance: stats::variance(&scores),
            score_std: stats::std_dev(&scores),
            score_range: stats::max(&scores) - stats::min(&scores),
            survival_variance: stats::variance(&lengths),
            survival_std: stats::std_dev(&lengths),
        }
    }

    /// Initial-condition sensitivity grouped by the first variable (in key
    /// order) of each run's initial state.
    pub fn initial_condition_sensitivity(&self) -> f64 {
        self.initial_condition_sensitivity_by(first_variable_key)
    }

    /// Ratio of between-group to within-group score variance, with groups
    /// assigned by `classifier`.
    ///
    /// Within-group variance averages only groups with at least two runs;
    /// when it is zero the plain between-group variance is returned.
    pub fn initial_condition_sensitivity_by<F>(&self, classifier: F) -> f64
    where
        F: Fn(&WorldState) -> String,
    {
        if self.results.len() < 2 {
            return 0.0;
        }

        let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for result in self.results {
            groups
                .entry(classifier(&result.initial_state))
                .or_default()
                .push(result.outcome_score);
        }
        if groups.len() < 2 {
            return 0.0;
        }

        let group_means: Vec<f64> = groups.values().map(|s| stats::mean(s)).collect();
        let between = stats::variance(&group_means);
        let within_each: Vec<f64> = groups
            .values()
            .filter(|s| s.len() > 1)
            .map(|s| stats::variance(s))
            .collect();
        let within = stats::mean(&within_each);

        if within > 0.0 {
            between / within
        } else {
            between
        }
    }

    /// Share of all runs whose score sits at or below the tail percentile
    /// and under the tail ceiling.
    pub fn tail_risk(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        let scores = self.scores();
        let threshold = stats::percentile(&scores, self.config.tail_percentile);
        let in_tail = scores
            .iter()
            .filter(|&&s| s <= threshold && s < self.config.tail_score_ceiling)
            .count();
        in_tail as f64 / scores.len() as f64
    }

    /// Weighted composite of noise, failure rate, score range and tail
    /// risk, clamped to 0..=1.
    pub fn brittleness_score(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        let scores = self.scores();
        let failure_rate =
            self.results.iter().filter(|r| r.is_failure()).count() as f64 / self.results.len() as f64;
        let score_range = stats::max(&scores) - stats::min(&scores);

        let brittleness = 0.3 * self.noise_sensitivity().min(1.0)
            + 0.3 * failure_rate
            + 0.2 * score_range
            + 0.2 * self.tail_risk();
        brittleness.clamp(0.0, 1.0)
    }

    pub fn full_report(&self) -> SensitivityReport {
        let brittleness = self.brittleness_score();
        let report = SensitivityReport {
            noise_sensitivity: self.noise_sensitivity(),
            parameter_sensitivity: BTreeMap::new(),
            initial_condition_sensitivity: self.initial_condition_sensitivity(),
            brittleness_score: brittleness,
            stability_score: 1.0 - brittleness,
            details: self.outcome_variance(),
        };
        tracing::debug!(
            runs = self.results.len(),
            brittleness = report.brittleness_score,
            "Computed sensitivity report"
        );
        report
    }

    pub fn compare_sensitivity(&self, other: &SensitivityAnalyzer<'_>) -> SensitivityComparison {
        let ours = self.full_report();
        let theirs = other.full_report();
        SensitivityComparison {
            brittleness_diff: ours.brittleness_score - theirs.brittleness_score,
            stability_diff: ours.stability_score - theirs.stability_score,
            noise_sensitivity_diff: ours.noise_sensitivity - theirs.noise_sensitivity,
            ours_more_stable: ours.stability_score > theirs.stability_score,
            ours,
            theirs,
        }
    }
}

fn first_variable_key(state: &WorldState) -> String {
    state
        .variables()
        .values()
        .next()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "default".to_string())
}
