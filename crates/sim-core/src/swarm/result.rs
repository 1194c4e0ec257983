//! Swarm results.

use serde::{Deserialize, Serialize};
use sim_types::{Outcome, SimulationResult};
use std::fmt;
use uuid::Uuid;

use super::config::SwarmConfig;
use crate::error::SimError;

/// Classification of a world that produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Policy,
    World,
    Rule,
    UnknownAction,
    Panic,
    Timeout,
    /// The world could not be scheduled or its worker vanished
    Scheduler,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Policy => "policy",
            FailureKind::World => "world",
            FailureKind::Rule => "rule",
            FailureKind::UnknownAction => "unknown_action",
            FailureKind::Panic => "panic",
            FailureKind::Timeout => "timeout",
            FailureKind::Scheduler => "scheduler",
        };
        f.write_str(s)
    }
}

impl From<&SimError> for FailureKind {
    fn from(err: &SimError) -> Self {
        match err {
            SimError::Policy { .. } => FailureKind::Policy,
            SimError::World(_) => FailureKind::World,
            SimError::Rule { .. } => FailureKind::Rule,
            SimError::UnknownAction(_) => FailureKind::UnknownAction,
        }
    }
}

/// Error record for one world, keyed by seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldFailure {
    pub seed: u64,
    pub kind: FailureKind,
    pub message: String,
}

impl WorldFailure {
    pub fn new(seed: u64, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            seed,
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(seed: u64, err: &SimError) -> Self {
        Self::new(seed, FailureKind::from(err), err.to_string())
    }
}

impl fmt::Display for WorldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seed {} [{}]: {}", self.seed, self.kind, self.message)
    }
}

/// Everything a swarm evaluation produced.
///
/// Rates are computed on demand from `results`, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmResult {
    pub evaluation_id: Uuid,
    pub policy_name: String,
    /// Completed runs, in completion order
    pub results: Vec<SimulationResult>,
    pub config: SwarmConfig,
    pub total_time_seconds: f64,
    /// Worlds that produced no result
    pub errors: Vec<WorldFailure>,
}

impl SwarmResult {
    pub fn new(
        policy_name: impl Into<String>,
        results: Vec<SimulationResult>,
        errors: Vec<WorldFailure>,
        config: SwarmConfig,
        total_time_seconds: f64,
    ) -> Self {
        Self {
            evaluation_id: Uuid::new_v4(),
            policy_name: policy_name.into(),
            results,
            config,
            total_time_seconds,
            errors,
        }
    }

    /// Worlds that completed a run (whatever its outcome).
    pub fn successful_runs(&self) -> usize {
        self.results.len()
    }

    /// Worlds that errored, panicked or timed out.
    pub fn failed_runs(&self) -> usize {
        self.errors.len()
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.results.iter().map(|r| r.outcome).collect()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.results.iter().map(|r| r.outcome_score).collect()
    }

    pub fn survival_times(&self) -> Vec<u64> {
        self.results.iter().map(SimulationResult::survival_time).collect()
    }

    fn rate_of(&self, outcome: Outcome) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        let count = self.results.iter().filter(|r| r.outcome == outcome).count();
        count as f64 / self.results.len() as f64
    }

    pub fn success_rate(&self) -> f64 {
        self.rate_of(Outcome::Success)
    }

    pub fn failure_rate(&self) -> f64 {
        self.rate_of(Outcome::Failure)
    }

    pub fn timeout_rate(&self) -> f64 {
        self.rate_of(Outcome::Timeout)
    }

    pub fn filter_by_outcome(&self, outcome: Outcome) -> Vec<&SimulationResult> {
        self.results.iter().filter(|r| r.outcome == outcome).collect()
    }

    /// Results ordered by seed, for comparisons independent of scheduling.
    pub fn sorted_by_seed(&self) -> Vec<&SimulationResult> {
        let mut sorted: Vec<&SimulationResult> = self.results.iter().collect();
        sorted.sort_by_key(|r| r.seed);
        sorted
    }

    /// Every run and error, for export.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
