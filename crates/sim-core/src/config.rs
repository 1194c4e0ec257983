//! Configuration loading for evaluations.
//!
//! Evaluation settings can be loaded from a TOML file. Every table is
//! optional; missing values fall back to their defaults.
//!
//! ```toml
//! [swarm]
//! n_worlds = 500
//! executor_type = "thread"
//! base_seed = 7
//! timeout_seconds = 2.5
//!
//! [simulator]
//! max_steps = 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::simulator::DEFAULT_MAX_STEPS;
use crate::swarm::SwarmConfig;

/// Complete evaluation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EvaluationConfig {
    /// Swarm execution settings
    #[serde(default)]
    pub swarm: SwarmConfig,
    /// Per-world simulator settings
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl EvaluationConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.swarm.validate()?;
        self.simulator.validate()
    }
}

/// Simulator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Steps before a run is declared a timeout
    pub max_steps: u64,
    /// Keep state snapshots in every trajectory step
    pub record_full_trajectory: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            record_full_trajectory: true,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_steps == 0 {
            return Err(ConfigError::InvalidMaxSteps);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::ExecutorType;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EvaluationConfig::default();
        assert_eq!(config.swarm.n_worlds, 100);
        assert_eq!(config.simulator.max_steps, 100);
        assert!(config.simulator.record_full_trajectory);
    }

    #[test]
    fn test_partial_config() {
        let config = EvaluationConfig::from_str(
            r#"
            [swarm]
            n_worlds = 12
            executor_type = "isolated"
            "#,
        )
        .unwrap();

        assert_eq!(config.swarm.n_worlds, 12);
        assert_eq!(config.swarm.executor_type, ExecutorType::Isolated);
        assert_eq!(config.swarm.base_seed, 42);
        assert_eq!(config.simulator, SimulatorConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            EvaluationConfig::from_str("[swarm]\nn_worlds = 0"),
            Err(ConfigError::InvalidWorldCount(0))
        ));
        assert!(matches!(
            EvaluationConfig::from_str("[simulator]\nmax_steps = 0"),
            Err(ConfigError::InvalidMaxSteps)
        ));
        assert!(matches!(
            EvaluationConfig::from_str("[swarm]\nexecutor_type = \"process\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_from_file_round_trip() {
        let mut config = EvaluationConfig::default();
        config.swarm.n_worlds = 33;
        config.simulator.max_steps = 25;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

        let loaded = EvaluationConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let err = EvaluationConfig::from_file(Path::new("/nonexistent/eval.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
