//! Swarm configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use crate::error::ConfigError;

/// How worlds are mapped onto worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorType {
    /// Fixed pool of reusable worker threads
    #[default]
    Thread,
    /// A fresh worker thread per world; nothing is reused between worlds.
    ///
    /// Worlds still share one process. Panics and per-world timeouts are the
    /// only faults contained: a world that aborts the process, exhausts
    /// memory or leaks it takes every other world down with it.
    Isolated,
}

impl fmt::Display for ExecutorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorType::Thread => write!(f, "thread"),
            ExecutorType::Isolated => write!(f, "isolated"),
        }
    }
}

impl FromStr for ExecutorType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "thread" => Ok(ExecutorType::Thread),
            "isolated" => Ok(ExecutorType::Isolated),
            _ => Err(ConfigError::UnknownExecutorType(s.to_string())),
        }
    }
}

/// Settings for one swarm evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Number of worlds to simulate
    pub n_worlds: usize,
    /// Parallel workers; `None` uses the available parallelism
    pub max_workers: Option<usize>,
    pub executor_type: ExecutorType,
    /// World `i` is seeded with `base_seed + i`
    pub base_seed: u64,
    /// Per-world wall-clock limit
    pub timeout_seconds: Option<f64>,
    /// Log progress every 10% of worlds
    pub show_progress: bool,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            n_worlds: 100,
            max_workers: None,
            executor_type: ExecutorType::Thread,
            base_seed: 42,
            timeout_seconds: None,
            show_progress: true,
        }
    }
}

impl SwarmConfig {
    /// Validated configuration for `n_worlds` worlds with defaults elsewhere.
    pub fn new(n_worlds: usize) -> Result<Self, ConfigError> {
        let config = Self {
            n_worlds,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    pub fn with_executor_type(mut self, executor_type: ExecutorType) -> Self {
        self.executor_type = executor_type;
        self
    }

    pub fn with_base_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = Some(timeout.as_secs_f64());
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Checks every field, failing on the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_worlds < 1 {
            return Err(ConfigError::InvalidWorldCount(self.n_worlds));
        }
        if self.max_workers == Some(0) {
            return Err(ConfigError::InvalidWorkerCount);
        }
        if let Some(t) = self.timeout_seconds {
            if !(t.is_finite() && t > 0.0) {
                return Err(ConfigError::InvalidTimeout(t));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs_f64)
    }

    /// Seeds for every world, in order.
    pub fn seeds(&self) -> impl Iterator<Item = u64> {
        let base = self.base_seed;
        (0..self.n_worlds as u64).map(move |i| base.wrapping_add(i))
    }

    /// Worker count actually used: never more than there are worlds.
    pub fn worker_count(&self) -> usize {
        let available = self
            .max_workers
            .unwrap_or_else(|| thread::available_parallelism().map(|n| n.get()).unwrap_or(4));
        available.min(self.n_worlds).max(1)
    }
}
