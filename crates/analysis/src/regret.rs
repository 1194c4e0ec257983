//! Regret distribution analysis.
//!
//! Regret is the gap between the best achievable score and the score a
//! run actually reached.

use serde::{Deserialize, Serialize};
use sim_types::{Action, ActionType, Outcome, SimulationResult};
use std::collections::BTreeMap;
use std::fmt;

use crate::stats;

/// Percentile points reported for regret.
pub const REGRET_PERCENTILES: [u32; 7] = [10, 25, 50, 75, 90, 95, 99];

/// Summary of per-run regret values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegretDistribution {
    pub regrets: Vec<f64>,
    pub mean_regret: f64,
    pub std_regret: f64,
    pub max_regret: f64,
    pub median_regret: f64,
    pub total_regret: f64,
    pub regret_percentiles: BTreeMap<u32, f64>,
}

impl RegretDistribution {
    pub fn from_values(regrets: Vec<f64>) -> Self {
        if regrets.is_empty() {
            return Self::default();
        }
        Self {
            mean_regret: stats::mean(&regrets),
            std_regret: stats::std_dev(&regrets),
            max_regret: stats::max(&regrets),
            median_regret: stats::median(&regrets),
            total_regret: regrets.iter().sum(),
            regret_percentiles: stats::percentile_table(&regrets, &REGRET_PERCENTILES),
            regrets,
        }
    }

    pub fn len(&self) -> usize {
        self.regrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regrets.is_empty()
    }
}

impl fmt::Display for RegretDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Regret Analysis ({} runs):", self.len())?;
        writeln!(
            f,
            "  Mean regret: {:.3} ± {:.3}",
            self.mean_regret, self.std_regret
        )?;
        writeln!(f, "  Median regret: {:.3}", self.median_regret)?;
        writeln!(f, "  Max regret (worst case): {:.3}", self.max_regret)?;
        write!(
            f,
            "  95th percentile: {:.3}",
            self.regret_percentiles.get(&95).copied().unwrap_or(0.0)
        )
    }
}

/// A high-regret run with the tail of its trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostlyRun {
    pub seed: u64,
    pub regret: f64,
    pub outcome: Outcome,
    pub total_steps: u64,
    /// Names of the last (up to) three actions taken
    pub last_actions: Vec<String>,
    /// Names of the last (up to) three events that fired
    pub last_events: Vec<String>,
}

pub struct RegretAnalyzer<'a> {
    results: &'a [SimulationResult],
    optimal_score: f64,
}

impl<'a> RegretAnalyzer<'a> {
    pub fn new(results: &'a [SimulationResult]) -> Self {
        Self {
            results,
            optimal_score: 1.0,
        }
    }

    pub fn with_optimal_score(mut self, optimal_score: f64) -> Self {
        self.optimal_score = optimal_score;
        self
    }

    pub fn optimal_score(&self) -> f64 {
        self.optimal_score
    }

    fn regret_of(&self, result: &SimulationResult) -> f64 {
        self.optimal_score - result.outcome_score
    }

    /// Regret of every run against the optimal score.
    pub fn outcome_regret(&self) -> RegretDistribution {
        let regrets = self.results.iter().map(|r| self.regret_of(r)).collect();
        let dist = RegretDistribution::from_values(regrets);
        tracing::debug!(
            runs = dist.len(),
            mean_regret = dist.mean_regret,
            "Computed outcome regret"
        );
        dist
    }

    /// Regret against a baseline population, paired by seed.
    ///
    /// Each value is `baseline_score - our_score`. Seeds present in only one
    /// population are dropped; pairs are taken in seed order.
    pub fn relative_regret(&self, baseline: &[SimulationResult]) -> RegretDistribution {
        let ours: BTreeMap<u64, f64> = self
            .results
            .iter()
            .map(|r| (r.seed, r.outcome_score))
            .collect();
        let theirs: BTreeMap<u64, f64> =
            baseline.iter().map(|r| (r.seed, r.outcome_score)).collect();

        let regrets = ours
            .iter()
            .filter_map(|(seed, our_score)| theirs.get(seed).map(|base| base - our_score))
            .collect();
        RegretDistribution::from_values(regrets)
    }

    /// Running average regret keyed by run length.
    ///
    /// A run enters the average once, at the step it ended, so the map is a
    /// step function over the distinct run lengths.
    pub fn cumulative_regret(&self) -> BTreeMap<u64, f64> {
        let mut by_length: BTreeMap<u64, Vec<f64>> = BTreeMap::new();
        for result in self.results {
            by_length
                .entry(result.total_steps)
                .or_default()
                .push(self.regret_of(result));
        }

        let mut running_total = 0.0;
        let mut running_count = 0usize;
        by_length
            .into_iter()
            .map(|(steps, regrets)| {
                running_total += regrets.iter().sum::<f64>();
                running_count += regrets.len();
                (steps, running_total / running_count as f64)
            })
            .collect()
    }

    /// Mean regret grouped by each run's most frequent action type.
    pub fn regret_by_action_type(&self) -> BTreeMap<ActionType, f64> {
        self.group_regret(|action| action.action_type)
    }

    /// Mean regret grouped by each run's most frequent action class, as
    /// assigned by `classifier`.
    pub fn regret_by_decision<F>(&self, classifier: F) -> BTreeMap<String, f64>
    where
        F: Fn(&Action) -> String,
    {
        self.group_regret(classifier)
    }

    fn group_regret<K, F>(&self, key: F) -> BTreeMap<K, f64>
    where
        K: Ord + Clone,
        F: Fn(&Action) -> K,
    {
        let mut groups: BTreeMap<K, Vec<f64>> = BTreeMap::new();
        for result in self.results {
            if let Some(dominant) = dominant_key(result.actions(), &key) {
                groups.entry(dominant).or_default().push(self.regret_of(result));
            }
        }
        groups
            .into_iter()
            .map(|(k, regrets)| (k, stats::mean(&regrets)))
            .collect()
    }

    /// Runs whose regret is at least `threshold`, worst first.
    pub fn costly_decisions(&self, threshold: f64) -> Vec<CostlyRun> {
        let mut costly: Vec<CostlyRun> = self
            .results
            .iter()
            .filter(|r| self.regret_of(r) >= threshold)
            .map(|r| CostlyRun {
                seed: r.seed,
                regret: self.regret_of(r),
                outcome: r.outcome,
                total_steps: r.total_steps,
                last_actions: last_n(r.trajectory.iter().map(|s| s.action.name.clone()), 3),
                last_events: last_n(r.events_occurred.iter().map(|e| e.name.clone()), 3),
            })
            .collect();

        costly.sort_by(|a, b| b.regret.total_cmp(&a.regret).then(a.seed.cmp(&b.seed)));
        costly
    }
}

/// Most frequent key over the actions; ties go to the key seen first.
fn dominant_key<'r, K, F>(actions: impl Iterator<Item = &'r Action>, key: &F) -> Option<K>
where
    K: PartialEq + Clone,
    F: Fn(&Action) -> K,
{
    let mut counts: Vec<(K, usize)> = Vec::new();
    for action in actions {
        let k = key(action);
        match counts.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, count)) => *count += 1,
            None => counts.push((k, 1)),
        }
    }

    let mut best: Option<(K, usize)> = None;
    for (k, count) in counts {
        if best.as_ref().map_or(true, |(_, top)| count > *top) {
            best = Some((k, count));
        }
    }
    best.map(|(k, _)| k)
}

fn last_n(items: impl Iterator<Item = String>, n: usize) -> Vec<String> {
    let all: Vec<String> = items.collect();
    let start = all.len().saturating_sub(n);
    all[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{run, with_actions, with_events};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_distribution() {
        let dist = RegretAnalyzer::new(&[]).outcome_regret();
        assert!(dist.is_empty());
        assert_eq!(dist.mean_regret, 0.0);
        assert!(dist.regret_percentiles.is_empty());
    }

    #[test]
    fn test_outcome_regret() {
        let results = vec![
            run(1, Outcome::Success, 1.0, 10),
            run(2, Outcome::Failure, 0.0, 4),
            run(3, Outcome::Success, 0.5, 12),
            run(4, Outcome::Timeout, 0.5, 20),
        ];
        let dist = RegretAnalyzer::new(&results).outcome_regret();

        assert_eq!(dist.len(), 4);
        assert!(approx(dist.mean_regret, 0.5));
        assert!(approx(dist.max_regret, 1.0));
        assert!(approx(dist.median_regret, 0.5));
        assert!(approx(dist.total_regret, 2.0));
        assert_eq!(
            dist.regret_percentiles.keys().copied().collect::<Vec<_>>(),
            REGRET_PERCENTILES.to_vec()
        );
        assert!(dist.regret_percentiles.values().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_regret_bounds_are_exact() {
        let perfect: Vec<_> = (0..7).map(|i| run(i, Outcome::Success, 1.0, 10)).collect();
        let dist = RegretAnalyzer::new(&perfect).outcome_regret();
        assert_eq!(dist.mean_regret, 0.0);
        assert_eq!(dist.max_regret, 0.0);

        let ruined: Vec<_> = (0..7).map(|i| run(i, Outcome::Failure, 0.0, 4)).collect();
        let dist = RegretAnalyzer::new(&ruined).outcome_regret();
        assert_eq!(dist.mean_regret, 1.0);
        assert_eq!(dist.max_regret, 1.0);
    }

    #[test]
    fn test_custom_optimal_score() {
        let results = vec![run(1, Outcome::Success, 0.8, 10)];
        let dist = RegretAnalyzer::new(&results)
            .with_optimal_score(2.0)
            .outcome_regret();
        assert!(approx(dist.mean_regret, 1.2));
    }

    #[test]
    fn test_relative_regret_pairs_by_seed() {
        let ours = vec![run(1, Outcome::Success, 0.6, 10), run(2, Outcome::Failure, 0.0, 3)];
        let baseline = vec![
            run(2, Outcome::Success, 0.9, 10),
            run(1, Outcome::Success, 1.0, 10),
            run(7, Outcome::Success, 1.0, 10),
        ];
        let dist = RegretAnalyzer::new(&ours).relative_regret(&baseline);

        assert_eq!(dist.len(), 2);
        assert!(approx(dist.regrets[0], 0.4));
        assert!(approx(dist.regrets[1], 0.9));
    }

    #[test]
    fn test_relative_regret_without_overlap() {
        let ours = vec![run(1, Outcome::Success, 0.6, 10)];
        let baseline = vec![run(2, Outcome::Success, 0.9, 10)];
        assert!(RegretAnalyzer::new(&ours).relative_regret(&baseline).is_empty());
    }

    #[test]
    fn test_cumulative_regret_step_function() {
        let results = vec![
            run(1, Outcome::Failure, 0.0, 5),
            run(2, Outcome::Success, 1.0, 10),
            run(3, Outcome::Success, 0.5, 10),
        ];
        let cumulative = RegretAnalyzer::new(&results).cumulative_regret();

        assert_eq!(cumulative.keys().copied().collect::<Vec<_>>(), vec![5, 10]);
        assert!(approx(cumulative[&5], 1.0));
        assert!(approx(cumulative[&10], 0.5));
    }

    #[test]
    fn test_regret_by_action_type() {
        let results = vec![
            with_actions(
                run(1, Outcome::Failure, 0.0, 3),
                &[("push", ActionType::Aggressive), ("push", ActionType::Aggressive), ("wait", ActionType::Delay)],
            ),
            with_actions(
                run(2, Outcome::Success, 1.0, 2),
                &[("wait", ActionType::Delay), ("push", ActionType::Aggressive)],
            ),
            run(3, Outcome::Success, 1.0, 0),
        ];
        let by_type = RegretAnalyzer::new(&results).regret_by_action_type();

        assert_eq!(by_type.len(), 2);
        assert!(approx(by_type[&ActionType::Aggressive], 1.0));
        // Tie broken by the first action type seen
        assert!(approx(by_type[&ActionType::Delay], 0.0));
    }

    #[test]
    fn test_regret_by_custom_classifier() {
        let results = vec![
            with_actions(run(1, Outcome::Failure, 0.0, 2), &[("ship", ActionType::Aggressive), ("ship", ActionType::Aggressive)]),
            with_actions(run(2, Outcome::Success, 0.6, 1), &[("fix", ActionType::Conservative)]),
        ];
        let by_class = RegretAnalyzer::new(&results)
            .regret_by_decision(|a| if a.name == "ship" { "risky".into() } else { "safe".into() });

        assert!(approx(by_class["risky"], 1.0));
        assert!(approx(by_class["safe"], 0.4));
    }

    #[test]
    fn test_costly_decisions() {
        let results = vec![
            with_events(
                with_actions(
                    run(1, Outcome::Failure, 0.0, 4),
                    &[
                        ("a", ActionType::Proceed),
                        ("b", ActionType::Proceed),
                        ("c", ActionType::Proceed),
                        ("d", ActionType::Proceed),
                    ],
                ),
                &[("e1", false), ("e2", false), ("e3", true), ("e4", false)],
            ),
            run(2, Outcome::Success, 0.5, 8),
            run(3, Outcome::Success, 0.9, 8),
        ];
        let costly = RegretAnalyzer::new(&results).costly_decisions(0.5);

        assert_eq!(costly.len(), 2);
        assert_eq!(costly[0].seed, 1);
        assert_eq!(costly[0].last_actions, vec!["b", "c", "d"]);
        assert_eq!(costly[0].last_events, vec!["e2", "e3", "e4"]);
        assert_eq!(costly[1].seed, 2);
        assert!(costly[1].last_actions.is_empty());
    }
}
