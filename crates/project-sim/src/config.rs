//! Configuration for the project world and the `robustness` binary.
//!
//! A single TOML file can carry the evaluation, the world and the analysis
//! settings. Every table is optional.
//!
//! ```toml
//! [swarm]
//! n_worlds = 500
//! base_seed = 7
//!
//! [simulator]
//! max_steps = 50
//!
//! [project]
//! initial_budget = 80
//! debt_bug_threshold = 30
//!
//! [analysis.regret]
//! costly_threshold = 0.6
//! ```

use analysis::{AnalysisConfig, AnalysisConfigError};
use serde::{Deserialize, Serialize};
use sim_core::{ConfigError, EvaluationConfig, SimulatorConfig, SwarmConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Weeks a project runs before it is declared a timeout.
pub const DEFAULT_PROJECT_WEEKS: u64 = 50;

/// Starting point and dynamics of a simulated project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub initial_progress: f64,
    pub initial_debt: f64,
    pub initial_morale: f64,
    pub initial_budget: f64,
    pub initial_bugs: i64,
    /// Progress per week at full morale and productivity
    pub base_progress_rate: f64,
    /// Debt above which bugs appear on their own
    pub debt_bug_threshold: f64,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            initial_progress: 0.0,
            initial_debt: 10.0,
            initial_morale: 75.0,
            initial_budget: 100.0,
            initial_bugs: 0,
            base_progress_rate: 5.0,
            debt_bug_threshold: 40.0,
        }
    }
}

impl ProjectConfig {
    pub fn with_budget(mut self, budget: f64) -> Self {
        self.initial_budget = budget;
        self
    }

    pub fn with_morale(mut self, morale: f64) -> Self {
        self.initial_morale = morale;
        self
    }

    pub fn with_debt(mut self, debt: f64) -> Self {
        self.initial_debt = debt;
        self
    }

    pub fn validate(&self) -> Result<(), ProjectConfigError> {
        for (field, value) in [
            ("initial_progress", self.initial_progress),
            ("initial_debt", self.initial_debt),
            ("initial_morale", self.initial_morale),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ProjectConfigError::OutOfRange { field, value });
            }
        }
        if !(self.initial_budget.is_finite() && self.initial_budget >= 0.0) {
            return Err(ProjectConfigError::OutOfRange {
                field: "initial_budget",
                value: self.initial_budget,
            });
        }
        if self.initial_bugs < 0 {
            return Err(ProjectConfigError::NegativeBugs(self.initial_bugs));
        }
        if !(self.base_progress_rate.is_finite() && self.base_progress_rate > 0.0) {
            return Err(ProjectConfigError::InvalidProgressRate(self.base_progress_rate));
        }
        if !(self.debt_bug_threshold.is_finite() && self.debt_bug_threshold >= 0.0) {
            return Err(ProjectConfigError::OutOfRange {
                field: "debt_bug_threshold",
                value: self.debt_bug_threshold,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectConfigError {
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("initial_bugs must not be negative, got {0}")]
    NegativeBugs(i64),
    #[error("base_progress_rate must be positive, got {0}")]
    InvalidProgressRate(f64),
}

/// Everything one `robustness evaluate` needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessConfig {
    #[serde(default)]
    pub swarm: SwarmConfig,
    #[serde(default = "project_simulator")]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

fn project_simulator() -> SimulatorConfig {
    // reports never look at per-step state snapshots
    SimulatorConfig {
        max_steps: DEFAULT_PROJECT_WEEKS,
        record_full_trajectory: false,
    }
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            swarm: SwarmConfig::default(),
            simulator: project_simulator(),
            project: ProjectConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl RobustnessConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RobustnessConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| RobustnessConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, RobustnessConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), RobustnessConfigError> {
        self.evaluation().validate()?;
        self.project.validate()?;
        self.analysis.validate()?;
        Ok(())
    }

    /// The engine-facing part of the configuration.
    pub fn evaluation(&self) -> EvaluationConfig {
        EvaluationConfig {
            swarm: self.swarm.clone(),
            simulator: self.simulator.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RobustnessConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("evaluation: {0}")]
    Evaluation(#[from] ConfigError),
    #[error("project: {0}")]
    Project(#[from] ProjectConfigError),
    #[error("analysis: {0}")]
    Analysis(#[from] AnalysisConfigError),
}
