//! Error Types
//!
//! Runtime errors raised while simulating a single world, and validation
//! errors raised when building configuration.

use std::path::PathBuf;
use thiserror::Error;

/// An error raised by a rule condition while it was being evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct RuleError {
    pub message: String,
}

impl RuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Errors raised while running one world.
///
/// These never cross the swarm executor boundary: the executor records them
/// per seed and keeps going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// The policy could not produce a decision
    #[error("policy '{policy}' failed: {message}")]
    Policy { policy: String, message: String },
    /// The world rejected a transition or event
    #[error("world error: {0}")]
    World(String),
    /// A rule condition failed while errors are surfaced
    #[error("rule '{rule}' failed: {source}")]
    Rule {
        rule: String,
        #[source]
        source: RuleError,
    },
    /// The policy chose an action the world does not know
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

impl SimError {
    /// Short classification used in error records.
    pub fn kind(&self) -> &'static str {
        match self {
            SimError::Policy { .. } => "policy",
            SimError::World(_) => "world",
            SimError::Rule { .. } => "rule",
            SimError::UnknownAction(_) => "unknown_action",
        }
    }
}

/// Configuration validation and loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("n_worlds must be at least 1, got {0}")]
    InvalidWorldCount(usize),
    #[error("max_workers must be at least 1 when set")]
    InvalidWorkerCount,
    #[error("timeout_seconds must be positive and finite, got {0}")]
    InvalidTimeout(f64),
    #[error("max_steps must be at least 1")]
    InvalidMaxSteps,
    #[error("unknown executor type '{0}' (expected 'thread' or 'isolated')")]
    UnknownExecutorType(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(SimError::World("x".into()).kind(), "world");
        assert_eq!(SimError::UnknownAction("x".into()).kind(), "unknown_action");
        let rule = SimError::Rule {
            rule: "low_budget".into(),
            source: RuleError::new("missing variable"),
        };
        assert_eq!(rule.kind(), "rule");
        assert_eq!(rule.to_string(), "rule 'low_budget' failed: missing variable");
    }
}
