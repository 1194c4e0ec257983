//! Outcome collection.
//!
//! Turns the runs of one swarm into outcome counts and value distributions.

use serde::{Deserialize, Serialize};
use sim_core::SwarmResult;
use sim_types::{Outcome, SimulationResult};
use std::collections::BTreeMap;
use std::fmt;

use crate::stats;

/// Percentile points reported by [`OutcomeDistribution::from_values`].
pub const DISTRIBUTION_PERCENTILES: [u32; 7] = [5, 10, 25, 50, 75, 90, 95];

/// Descriptive statistics of one sampled quantity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutcomeDistribution {
    pub values: Vec<f64>,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub percentiles: BTreeMap<u32, f64>,
    pub min: f64,
    pub max: f64,
}

impl OutcomeDistribution {
    pub fn from_values(values: Vec<f64>) -> Self {
        Self::with_percentiles(values, &DISTRIBUTION_PERCENTILES)
    }

    pub fn with_percentiles(values: Vec<f64>, points: &[u32]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        Self {
            mean: stats::mean(&values),
            std: stats::std_dev(&values),
            median: stats::median(&values),
            percentiles: stats::percentile_table(&values, points),
            min: stats::min(&values),
            max: stats::max(&values),
            values,
        }
    }

    pub fn percentile(&self, p: u32) -> Option<f64> {
        self.percentiles.get(&p).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for OutcomeDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mean: {:.3} ± {:.3}", self.mean, self.std)?;
        writeln!(f, "Median: {:.3}", self.median)?;
        writeln!(f, "Range: [{:.3}, {:.3}]", self.min, self.max)?;
        write!(
            f,
            "5th-95th percentile: [{:.3}, {:.3}]",
            self.percentile(5).unwrap_or(0.0),
            self.percentile(95).unwrap_or(0.0)
        )
    }
}

/// Outcome category counts and rates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub timeout_count: usize,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub timeout_rate: f64,
}

impl OutcomeSummary {
    pub fn from_results(results: &[SimulationResult]) -> Self {
        let total = results.len();
        if total == 0 {
            return Self::default();
        }
        let count = |outcome: Outcome| results.iter().filter(|r| r.outcome == outcome).count();
        let success_count = count(Outcome::Success);
        let failure_count = count(Outcome::Failure);
        let timeout_count = count(Outcome::Timeout);

        Self {
            total,
            success_count,
            failure_count,
            timeout_count,
            success_rate: success_count as f64 / total as f64,
            failure_rate: failure_count as f64 / total as f64,
            timeout_rate: timeout_count as f64 / total as f64,
        }
    }
}

impl fmt::Display for OutcomeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Runs: {}", self.total)?;
        writeln!(
            f,
            "Success: {} ({:.1}%)",
            self.success_count,
            self.success_rate * 100.0
        )?;
        writeln!(
            f,
            "Failure: {} ({:.1}%)",
            self.failure_count,
            self.failure_rate * 100.0
        )?;
        write!(
            f,
            "Timeout: {} ({:.1}%)",
            self.timeout_count,
            self.timeout_rate * 100.0
        )
    }
}

/// Differences between two collectors, ours minus theirs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeComparison {
    pub success_rate_diff: f64,
    pub failure_rate_diff: f64,
    pub mean_score_diff: f64,
    pub median_score_diff: f64,
    pub ours: OutcomeSummary,
    pub theirs: OutcomeSummary,
}

/// The worst-scoring slice of a population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailRisk {
    /// Fraction of the population the tail was cut at
    pub threshold: f64,
    /// Runs scoring at or below the tail cut-off (ties included)
    pub n_tail: usize,
    pub worst_score: f64,
    pub tail_threshold_score: f64,
    pub tail_event_frequencies: BTreeMap<String, usize>,
    pub tail_failure_rate: f64,
}

/// Read-only view over the runs of an evaluation.
pub struct OutcomeCollector<'a> {
    results: &'a [SimulationResult],
}

impl<'a> OutcomeCollector<'a> {
    pub fn new(results: &'a [SimulationResult]) -> Self {
        Self { results }
    }

    pub fn from_swarm(swarm: &'a SwarmResult) -> Self {
        Self::new(&swarm.results)
    }

    pub fn n_runs(&self) -> usize {
        self.results.len()
    }

    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary::from_results(self.results)
    }

    pub fn score_distribution(&self) -> OutcomeDistribution {
        OutcomeDistribution::from_values(self.results.iter().map(|r| r.outcome_score).collect())
    }

    pub fn survival_distribution(&self) -> OutcomeDistribution {
        OutcomeDistribution::from_values(
            self.results
                .iter()
                .map(|r| r.survival_time() as f64)
                .collect(),
        )
    }

    /// Distribution of a numeric state variable across runs. Runs where the
    /// variable is missing or non-numeric are skipped.
    pub fn variable_distribution(&self, name: &str, from_final_state: bool) -> OutcomeDistribution {
        let values = self
            .results
            .iter()
            .filter_map(|r| {
                let state = if from_final_state {
                    &r.final_state
                } else {
                    &r.initial_state
                };
                state.get_f64(name)
            })
            .collect();
        OutcomeDistribution::from_values(values)
    }

    /// Occurrence count of every event across all runs.
    pub fn event_frequencies(&self) -> BTreeMap<String, usize> {
        count_events(self.results.iter())
    }

    /// Event occurrence counts per outcome. Every outcome has an entry,
    /// empty when no run ended that way.
    pub fn events_by_outcome(&self) -> BTreeMap<Outcome, BTreeMap<String, usize>> {
        [Outcome::Success, Outcome::Failure, Outcome::Timeout]
            .into_iter()
            .map(|outcome| {
                let counts = count_events(self.results.iter().filter(|r| r.outcome == outcome));
                (outcome, counts)
            })
            .collect()
    }

    pub fn compare_to(&self, other: &OutcomeCollector<'_>) -> OutcomeComparison {
        let ours = self.summary();
        let theirs = other.summary();
        let our_scores = self.score_distribution();
        let their_scores = other.score_distribution();

        OutcomeComparison {
            success_rate_diff: ours.success_rate - theirs.success_rate,
            failure_rate_diff: ours.failure_rate - theirs.failure_rate,
            mean_score_diff: our_scores.mean - their_scores.mean,
            median_score_diff: our_scores.median - their_scores.median,
            ours,
            theirs,
        }
    }

    /// Inspects the worst `threshold` fraction of runs by score (at least
    /// one run). Runs tied with the cut-off score are included.
    pub fn tail_risk(&self, threshold: f64) -> TailRisk {
        let scores = stats::sorted(&self.results.iter().map(|r| r.outcome_score).collect::<Vec<_>>());
        let n_tail = ((scores.len() as f64 * threshold) as usize).max(1);
        let cutoff = scores
            .get(n_tail.min(scores.len()).saturating_sub(1))
            .copied()
            .unwrap_or(0.0);

        let tail: Vec<&SimulationResult> = self
            .results
            .iter()
            .filter(|r| r.outcome_score <= cutoff)
            .collect();
        let failures = tail.iter().filter(|r| r.is_failure()).count();

        TailRisk {
            threshold,
            n_tail: tail.len(),
            worst_score: scores.first().copied().unwrap_or(0.0),
            tail_threshold_score: cutoff,
            tail_event_frequencies: count_events(tail.iter().copied()),
            tail_failure_rate: failures as f64 / tail.len().max(1) as f64,
        }
    }
}

fn count_events<'r>(results: impl Iterator<Item = &'r SimulationResult>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for result in results {
        for event in &result.events_occurred {
            *counts.entry(event.name.clone()).or_insert(0) += 1;
        }
    }
    counts
}
