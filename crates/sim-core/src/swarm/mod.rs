//! Swarm evaluation: one policy, many seeded worlds.

pub mod config;
pub mod executor;
pub mod result;

pub use config::{ExecutorType, SwarmConfig};
pub use executor::{ProgressCallback, SwarmExecutor};
pub use result::{FailureKind, SwarmResult, WorldFailure};
