//! Survival curve analysis.
//!
//! Kaplan-Meier estimation over run lengths. A failed run contributes an
//! event at its final step; a successful or timed-out run is censored there,
//! since it never failed while it was observed.

use serde::{Deserialize, Serialize};
use sim_types::SimulationResult;
use std::fmt;

/// Step-function survival estimate with Greenwood confidence bounds.
///
/// All vectors are parallel and indexed by the distinct run lengths in
/// ascending order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SurvivalCurve {
    pub timesteps: Vec<u64>,
    pub survival_prob: Vec<f64>,
    pub at_risk: Vec<usize>,
    pub events: Vec<usize>,
    pub confidence_lower: Vec<f64>,
    pub confidence_upper: Vec<f64>,
}

impl SurvivalCurve {
    pub fn is_empty(&self) -> bool {
        self.timesteps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.timesteps.len()
    }

    /// Survival probability at step `t`: the value at the last curve point
    /// not after `t`, or 1.0 before the first point.
    pub fn survival_at(&self, t: u64) -> f64 {
        let idx = self.timesteps.partition_point(|&ts| ts <= t);
        if idx == 0 {
            1.0
        } else {
            self.survival_prob[idx - 1]
        }
    }

    /// First step at which survival drops to 0.5 or below.
    pub fn median_survival(&self) -> Option<u64> {
        self.time_to_survival(0.5)
    }

    /// First step at which survival drops to `target` or below.
    pub fn time_to_survival(&self, target: f64) -> Option<u64> {
        self.survival_prob
            .iter()
            .position(|&p| p <= target)
            .map(|i| self.timesteps[i])
    }

    /// Survival at the end of the curve (1.0 for an empty curve).
    pub fn final_survival(&self) -> f64 {
        self.survival_prob.last().copied().unwrap_or(1.0)
    }
}

impl fmt::Display for SurvivalCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Survival Analysis:")?;
        writeln!(f, "  Final survival rate: {:.1}%", self.final_survival() * 100.0)?;
        match self.median_survival() {
            Some(t) => write!(f, "  Median survival time: {}", t)?,
            None => write!(f, "  Median survival time: N/A (>50% survive)")?,
        }
        for target in [0.9, 0.75, 0.5, 0.25] {
            if let Some(t) = self.time_to_survival(target) {
                write!(f, "\n  Time to {:.0}% failure: {}", (1.0 - target) * 100.0, t)?;
            }
        }
        Ok(())
    }
}

/// Side-by-side survival of two populations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalComparison {
    /// Ours minus theirs; only present when both curves reach 50%
    pub median_survival_diff: Option<f64>,
    pub final_survival_diff: f64,
    pub ours: SurvivalCurve,
    pub theirs: SurvivalCurve,
}

pub struct SurvivalAnalyzer<'a> {
    results: &'a [SimulationResult],
}

impl<'a> SurvivalAnalyzer<'a> {
    pub fn new(results: &'a [SimulationResult]) -> Self {
        Self { results }
    }

    /// Computes the Kaplan-Meier curve.
    ///
    /// Bounds use z = 1.96 at the 95% level and 1.645 at any other level.
    pub fn compute_survival_curve(&self, confidence_level: f64) -> SurvivalCurve {
        if self.results.is_empty() {
            return SurvivalCurve::default();
        }

        let mut observations: Vec<(u64, bool)> = self
            .results
            .iter()
            .map(|r| (r.total_steps, r.is_failure()))
            .collect();
        observations.sort_by_key(|&(t, _)| t);

        let n = observations.len();
        let z = if (confidence_level - 0.95).abs() < f64::EPSILON {
            1.96
        } else {
            1.645
        };

        let mut curve = SurvivalCurve::default();
        let mut survival = 1.0;
        let mut greenwood = 0.0;
        let mut start = 0;

        while start < n {
            let t = observations[start].0;
            let end = start + observations[start..].iter().take_while(|(ts, _)| *ts == t).count();

            let at_risk = n - start;
            let events = observations[start..end].iter().filter(|(_, failed)| *failed).count();

            if at_risk > 0 && events > 0 {
                survival *= (at_risk - events) as f64 / at_risk as f64;
            }
            if at_risk > events {
                greenwood += events as f64 / (at_risk * (at_risk - events)) as f64;
            }

            let se = if greenwood > 0.0 {
                survival * greenwood.sqrt()
            } else {
                0.0
            };

            curve.timesteps.push(t);
            curve.survival_prob.push(survival);
            curve.at_risk.push(at_risk);
            curve.events.push(events);
            curve.confidence_lower.push((survival - z * se).max(0.0));
            curve.confidence_upper.push((survival + z * se).min(1.0));

            start = end;
        }

        tracing::debug!(
            runs = n,
            points = curve.len(),
            final_survival = curve.final_survival(),
            "Computed survival curve"
        );
        curve
    }

    /// Failures per at-risk run per step over consecutive windows of
    /// `window` steps, as `(window_start, rate)` pairs.
    pub fn hazard_rate(&self, window: u64) -> Vec<(u64, f64)> {
        let window = window.max(1);
        let max_time = match self.results.iter().map(|r| r.total_steps).max() {
            Some(t) => t,
            None => return Vec::new(),
        };

        let mut rates = Vec::new();
        let mut t = 0;
        while t < max_time {
            let at_risk = self.results.iter().filter(|r| r.total_steps >= t).count();
            let failures = self
                .results
                .iter()
                .filter(|r| r.is_failure() && r.total_steps >= t && r.total_steps < t + window)
                .count();
            if at_risk > 0 {
                rates.push((t, failures as f64 / (at_risk as f64 * window as f64)));
            }
            t += window;
        }
        rates
    }

    pub fn compare_survival(&self, other: &SurvivalAnalyzer<'_>) -> SurvivalComparison {
        let ours = self.compute_survival_curve(0.95);
        let theirs = other.compute_survival_curve(0.95);

        let median_survival_diff = match (ours.median_survival(), theirs.median_survival()) {
            (Some(a), Some(b)) => Some(a as f64 - b as f64),
            _ => None,
        };

        SurvivalComparison {
            median_survival_diff,
            final_survival_diff: ours.final_survival() - theirs.final_survival(),
            ours,
            theirs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::run;
    use sim_types::Outcome;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_population() {
        let curve = SurvivalAnalyzer::new(&[]).compute_survival_curve(0.95);
        assert!(curve.is_empty());
        assert_eq!(curve.survival_at(10), 1.0);
        assert_eq!(curve.median_survival(), None);
        assert!(SurvivalAnalyzer::new(&[]).hazard_rate(5).is_empty());
    }

    #[test]
    fn test_no_failures_stays_at_one() {
        let results = vec![
            run(1, Outcome::Success, 1.0, 10),
            run(2, Outcome::Timeout, 0.5, 20),
        ];
        let curve = SurvivalAnalyzer::new(&results).compute_survival_curve(0.95);
        assert_eq!(curve.timesteps, vec![10, 20]);
        assert!(curve.survival_prob.iter().all(|&p| p == 1.0));
        assert_eq!(curve.median_survival(), None);
        assert!(curve.confidence_lower.iter().all(|&p| p == 1.0));
    }

    #[test]
    fn test_all_fail_at_same_time() {
        let results: Vec<_> = (0..7).map(|i| run(i, Outcome::Failure, 0.0, 13)).collect();
        let curve = SurvivalAnalyzer::new(&results).compute_survival_curve(0.95);

        assert_eq!(curve.timesteps, vec![13]);
        assert_eq!(curve.at_risk, vec![7]);
        assert_eq!(curve.events, vec![7]);
        assert_eq!(curve.final_survival(), 0.0);
        assert_eq!(curve.median_survival(), Some(13));
        assert_eq!(curve.confidence_lower, vec![0.0]);
        assert_eq!(curve.confidence_upper, vec![0.0]);
    }

    #[test]
    fn test_kaplan_meier_with_censoring() {
        // Failures at 5 and 10, a censored run at 7, survivors at 20
        let results = vec![
            run(1, Outcome::Failure, 0.0, 5),
            run(2, Outcome::Success, 1.0, 7),
            run(3, Outcome::Failure, 0.0, 10),
            run(4, Outcome::Success, 1.0, 20),
        ];
        let curve = SurvivalAnalyzer::new(&results).compute_survival_curve(0.95);

        assert_eq!(curve.timesteps, vec![5, 7, 10, 20]);
        assert_eq!(curve.at_risk, vec![4, 3, 2, 1]);
        assert_eq!(curve.events, vec![1, 0, 1, 0]);
        assert!(approx(curve.survival_prob[0], 0.75));
        assert!(approx(curve.survival_prob[1], 0.75));
        assert!(approx(curve.survival_prob[2], 0.375));
        assert!(approx(curve.final_survival(), 0.375));
        assert_eq!(curve.median_survival(), Some(10));

        for i in 0..curve.len() {
            assert!(curve.confidence_lower[i] <= curve.survival_prob[i]);
            assert!(curve.confidence_upper[i] >= curve.survival_prob[i]);
            assert!(curve.confidence_lower[i] >= 0.0 && curve.confidence_upper[i] <= 1.0);
        }
    }

    #[test]
    fn test_survival_at_is_a_step_lookup() {
        let results = vec![
            run(1, Outcome::Failure, 0.0, 5),
            run(2, Outcome::Failure, 0.0, 10),
            run(3, Outcome::Success, 1.0, 10),
            run(4, Outcome::Success, 1.0, 10),
        ];
        let curve = SurvivalAnalyzer::new(&results).compute_survival_curve(0.95);

        assert_eq!(curve.survival_at(0), 1.0);
        assert_eq!(curve.survival_at(4), 1.0);
        assert!(approx(curve.survival_at(5), 0.75));
        assert!(approx(curve.survival_at(9), 0.75));
        assert!(approx(curve.survival_at(10), 0.5));
        assert!(approx(curve.survival_at(1000), 0.5));
    }

    #[test]
    fn test_narrower_bounds_at_lower_confidence() {
        let results: Vec<_> = (0..20)
            .map(|i| {
                let outcome = if i % 3 == 0 { Outcome::Failure } else { Outcome::Success };
                run(i, outcome, 0.5, 5 + i)
            })
            .collect();
        let analyzer = SurvivalAnalyzer::new(&results);
        let wide = analyzer.compute_survival_curve(0.95);
        let narrow = analyzer.compute_survival_curve(0.90);

        let last = wide.len() - 1;
        assert_eq!(wide.survival_prob, narrow.survival_prob);
        assert!(narrow.confidence_lower[last] >= wide.confidence_lower[last]);
    }

    #[test]
    fn test_hazard_rate_windows() {
        let results = vec![
            run(1, Outcome::Failure, 0.0, 2),
            run(2, Outcome::Failure, 0.0, 7),
            run(3, Outcome::Success, 1.0, 10),
            run(4, Outcome::Success, 1.0, 10),
        ];
        let rates = SurvivalAnalyzer::new(&results).hazard_rate(5);

        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].0, 0);
        assert!(approx(rates[0].1, 1.0 / (4.0 * 5.0)));
        assert_eq!(rates[1].0, 5);
        assert!(approx(rates[1].1, 1.0 / (3.0 * 5.0)));
    }

    #[test]
    fn test_compare_survival() {
        let fragile = vec![
            run(1, Outcome::Failure, 0.0, 3),
            run(2, Outcome::Failure, 0.0, 4),
            run(3, Outcome::Success, 1.0, 10),
        ];
        let sturdy = vec![
            run(1, Outcome::Success, 1.0, 10),
            run(2, Outcome::Success, 1.0, 10),
        ];
        let cmp = SurvivalAnalyzer::new(&fragile).compare_survival(&SurvivalAnalyzer::new(&sturdy));

        assert!(cmp.final_survival_diff < 0.0);
        assert_eq!(cmp.median_survival_diff, None);
        assert_eq!(cmp.ours.median_survival(), Some(4));
    }

    #[test]
    fn test_display() {
        let results = vec![run(1, Outcome::Failure, 0.0, 3), run(2, Outcome::Success, 1.0, 9)];
        let text = SurvivalAnalyzer::new(&results)
            .compute_survival_curve(0.95)
            .to_string();
        assert!(text.starts_with("Survival Analysis:"));
        assert!(text.contains("Median survival time: 3"));
    }
}
