//! Configuration loading for the analyzers.
//!
//! Every table is optional and every field falls back to its default, so a
//! partial file only overrides what it names.
//!
//! ```toml
//! [survival]
//! confidence_level = 0.9
//! hazard_window = 10
//!
//! [collapse]
//! horizons = [5, 10, 20]
//!
//! [regret]
//! optimal_score = 1.0
//! costly_threshold = 0.6
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Complete analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub survival: SurvivalConfig,
    #[serde(default)]
    pub collapse: CollapseConfig,
    #[serde(default)]
    pub regret: RegretConfig,
    #[serde(default)]
    pub sensitivity: SensitivityConfig,
}

impl AnalysisConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, AnalysisConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| AnalysisConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, AnalysisConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), AnalysisConfigError> {
        let level = self.survival.confidence_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(AnalysisConfigError::InvalidConfidenceLevel(level));
        }
        if self.survival.hazard_window == 0 {
            return Err(AnalysisConfigError::InvalidHazardWindow);
        }
        let p = self.sensitivity.tail_percentile;
        if !(0.0..=100.0).contains(&p) {
            return Err(AnalysisConfigError::InvalidTailPercentile(p));
        }
        Ok(())
    }
}

/// Survival curve settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurvivalConfig {
    /// Confidence level of the Greenwood bounds
    pub confidence_level: f64,
    /// Width in steps of each hazard-rate window
    pub hazard_window: u64,
}

impl Default for SurvivalConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            hazard_window: 5,
        }
    }
}

/// Collapse analysis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CollapseConfig {
    /// Explicit horizons; the 10/25/50/75/100% ladder is used when absent
    pub horizons: Option<Vec<u64>>,
    /// Step limit the horizons are derived from; the longest run when absent
    pub max_steps: Option<u64>,
}

/// Regret analysis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegretConfig {
    pub optimal_score: f64,
    /// Minimum regret for a run to be flagged as costly
    pub costly_threshold: f64,
}

impl Default for RegretConfig {
    fn default() -> Self {
        Self {
            optimal_score: 1.0,
            costly_threshold: 0.5,
        }
    }
}

/// Sensitivity analysis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityConfig {
    /// Scores at or below this percentile form the tail
    pub tail_percentile: f64,
    /// Tail scores only count as bad below this value
    pub tail_score_ceiling: f64,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            tail_percentile: 10.0,
            tail_score_ceiling: 0.5,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("confidence level must be between 0 and 1 exclusive, got {0}")]
    InvalidConfidenceLevel(f64),
    #[error("hazard window must be at least one step")]
    InvalidHazardWindow,
    #[error("tail percentile must be within 0..=100, got {0}")]
    InvalidTailPercentile(f64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.survival.confidence_level, 0.95);
        assert_eq!(config.survival.hazard_window, 5);
        assert!(config.collapse.horizons.is_none());
        assert_eq!(config.regret.optimal_score, 1.0);
        assert_eq!(config.sensitivity.tail_percentile, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let config = AnalysisConfig::from_str(
            r#"
            [collapse]
            horizons = [5, 10]

            [regret]
            costly_threshold = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(config.collapse.horizons, Some(vec![5, 10]));
        assert_eq!(config.regret.costly_threshold, 0.8);
        assert_eq!(config.regret.optimal_score, 1.0);
        assert_eq!(config.survival, SurvivalConfig::default());
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            AnalysisConfig::from_str("[survival]\nconfidence_level = 1.5"),
            Err(AnalysisConfigError::InvalidConfidenceLevel(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_str("[survival]\nhazard_window = 0"),
            Err(AnalysisConfigError::InvalidHazardWindow)
        ));
        assert!(matches!(
            AnalysisConfig::from_str("[sensitivity]\ntail_percentile = 120.0"),
            Err(AnalysisConfigError::InvalidTailPercentile(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_str("[regret\n"),
            Err(AnalysisConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let mut config = AnalysisConfig::default();
        config.collapse.max_steps = Some(40);
        config.survival.hazard_window = 4;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

        assert_eq!(AnalysisConfig::from_file(file.path()).unwrap(), config);
    }
}
