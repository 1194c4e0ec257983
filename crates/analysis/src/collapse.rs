//! Collapse probability analysis.
//!
//! How often and how early runs fail, and which events travel with failure.

use serde::{Deserialize, Serialize};
use sim_types::SimulationResult;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::stats;

/// Step limit assumed when there is neither an explicit limit nor any run.
pub const DEFAULT_MAX_STEPS: u64 = 100;

/// Fractions of the step limit used when no horizons are given.
pub const DEFAULT_HORIZON_FRACTIONS: [f64; 4] = [0.1, 0.25, 0.5, 0.75];

/// Failure-timing metrics for one population.
///
/// Every rate is a share of all runs, not of failed runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollapseMetrics {
    pub collapse_probability: f64,
    /// Absent when nothing failed
    pub mean_time_to_collapse: Option<f64>,
    pub std_time_to_collapse: Option<f64>,
    /// Share of runs that failed at or before each horizon
    pub collapse_by_horizon: BTreeMap<u64, f64>,
    pub irreversible_collapse_rate: f64,
    /// Failed within the first 20% of the step limit
    pub early_collapse_rate: f64,
    /// Failed within the last 20% of the step limit
    pub late_collapse_rate: f64,
    pub total_runs: usize,
    pub collapse_count: usize,
}

impl CollapseMetrics {
    fn empty() -> Self {
        Self {
            collapse_probability: 0.0,
            mean_time_to_collapse: None,
            std_time_to_collapse: None,
            collapse_by_horizon: BTreeMap::new(),
            irreversible_collapse_rate: 0.0,
            early_collapse_rate: 0.0,
            late_collapse_rate: 0.0,
            total_runs: 0,
            collapse_count: 0,
        }
    }
}

impl fmt::Display for CollapseMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Collapse Analysis ({} runs):", self.total_runs)?;
        write!(
            f,
            "  Overall collapse probability: {:.1}%",
            self.collapse_probability * 100.0
        )?;
        if let (Some(mean), Some(std)) = (self.mean_time_to_collapse, self.std_time_to_collapse) {
            write!(f, "\n  Mean time to collapse: {:.1} steps", mean)?;
            write!(f, "\n  Std time to collapse: {:.1} steps", std)?;
        }
        write!(
            f,
            "\n  Early collapse rate (first 20%): {:.1}%",
            self.early_collapse_rate * 100.0
        )?;
        write!(
            f,
            "\n  Late collapse rate (last 20%): {:.1}%",
            self.late_collapse_rate * 100.0
        )?;
        write!(
            f,
            "\n  Irreversible collapse rate: {:.1}%",
            self.irreversible_collapse_rate * 100.0
        )?;
        if !self.collapse_by_horizon.is_empty() {
            write!(f, "\n  Collapse probability by horizon:")?;
            for (horizon, prob) in &self.collapse_by_horizon {
                write!(f, "\n    Step {}: {:.1}%", horizon, prob * 100.0)?;
            }
        }
        Ok(())
    }
}

pub struct CollapseAnalyzer<'a> {
    results: &'a [SimulationResult],
    max_steps: u64,
}

impl<'a> CollapseAnalyzer<'a> {
    /// Creates an analyzer. Without an explicit step limit the longest
    /// observed run stands in for it.
    pub fn new(results: &'a [SimulationResult], max_steps: Option<u64>) -> Self {
        let max_steps = max_steps
            .or_else(|| results.iter().map(|r| r.total_steps).max())
            .unwrap_or(DEFAULT_MAX_STEPS);
        Self { results, max_steps }
    }

    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    /// 10/25/50/75/100% of the step limit, truncated to whole steps.
    pub fn default_horizons(&self) -> Vec<u64> {
        let mut horizons: Vec<u64> = DEFAULT_HORIZON_FRACTIONS
            .iter()
            .map(|f| (self.max_steps as f64 * f) as u64)
            .collect();
        horizons.push(self.max_steps);
        horizons
    }

    fn failures(&self) -> impl Iterator<Item = &SimulationResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    pub fn compute_metrics(&self, horizons: Option<&[u64]>) -> CollapseMetrics {
        if self.results.is_empty() {
            return CollapseMetrics::empty();
        }

        let total = self.results.len();
        let share = |count: usize| count as f64 / total as f64;
        let failure_times: Vec<u64> = self.failures().map(|r| r.total_steps).collect();
        let collapse_count = failure_times.len();

        let (mean_time_to_collapse, std_time_to_collapse) = if failure_times.is_empty() {
            (None, None)
        } else {
            let times: Vec<f64> = failure_times.iter().map(|&t| t as f64).collect();
            (Some(stats::mean(&times)), Some(stats::std_dev(&times)))
        };

        let horizons = match horizons {
            Some(h) => h.to_vec(),
            None => self.default_horizons(),
        };
        let collapse_by_horizon = horizons
            .into_iter()
            .map(|h| (h, share(failure_times.iter().filter(|&&t| t <= h).count())))
            .collect();

        let irreversible = self.failures().filter(|r| r.had_irreversible_event()).count();

        let early_threshold = (self.max_steps as f64 * 0.2) as u64;
        let late_threshold = (self.max_steps as f64 * 0.8) as u64;
        let early = failure_times.iter().filter(|&&t| t <= early_threshold).count();
        // A run can only be early or late, even for very short step limits
        let late = failure_times
            .iter()
            .filter(|&&t| t >= late_threshold && t > early_threshold)
            .count();

        let metrics = CollapseMetrics {
            collapse_probability: share(collapse_count),
            mean_time_to_collapse,
            std_time_to_collapse,
            collapse_by_horizon,
            irreversible_collapse_rate: share(irreversible),
            early_collapse_rate: share(early),
            late_collapse_rate: share(late),
            total_runs: total,
            collapse_count,
        };

        tracing::debug!(
            runs = total,
            failures = collapse_count,
            collapse_probability = metrics.collapse_probability,
            "Computed collapse metrics"
        );
        metrics
    }

    /// Relative risk of each event: occurrences per failed run divided by
    /// occurrences per successful run.
    ///
    /// An event never seen in a success scores infinity. The result is
    /// sorted by descending risk, ties by name, and is empty unless the
    /// population has both failures and successes.
    pub fn collapse_triggers(&self) -> Vec<(String, f64)> {
        let failures: Vec<&SimulationResult> = self.failures().collect();
        let successes: Vec<&SimulationResult> =
            self.results.iter().filter(|r| r.is_success()).collect();
        if failures.is_empty() || successes.is_empty() {
            return Vec::new();
        }

        let failure_counts = count_events(&failures);
        let success_counts = count_events(&successes);
        let names: BTreeSet<&String> = failure_counts.keys().chain(success_counts.keys()).collect();

        let mut triggers: Vec<(String, f64)> = names
            .into_iter()
            .map(|name| {
                let fail_rate = failure_counts.get(name).copied().unwrap_or(0) as f64
                    / failures.len() as f64;
                let success_rate = success_counts.get(name).copied().unwrap_or(0) as f64
                    / successes.len() as f64;
                let risk = if success_rate > 0.0 {
                    fail_rate / success_rate
                } else if fail_rate > 0.0 {
                    f64::INFINITY
                } else {
                    1.0
                };
                (name.clone(), risk)
            })
            .collect();

        triggers.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        triggers
    }

    /// Failure share among runs matching `predicate`; 0.0 if none match.
    pub fn conditional_collapse<F>(&self, predicate: F) -> f64
    where
        F: Fn(&SimulationResult) -> bool,
    {
        let matching: Vec<&SimulationResult> =
            self.results.iter().filter(|r| predicate(r)).collect();
        if matching.is_empty() {
            return 0.0;
        }
        let failures = matching.iter().filter(|r| r.is_failure()).count();
        failures as f64 / matching.len() as f64
    }
}

fn count_events(results: &[&SimulationResult]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for result in results {
        for event in &result.events_occurred {
            *counts.entry(event.name.clone()).or_insert(0) += 1;
        }
    }
    counts
}
