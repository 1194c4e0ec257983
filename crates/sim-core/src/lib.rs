//! Core engine for distribution-based policy evaluation.
//!
//! A [`World`] is a seeded state machine, a [`Policy`] picks actions, the
//! [`Simulator`] couples the two for one run, and the [`SwarmExecutor`] runs
//! the same policy across many seeded worlds in parallel.

pub mod config;
pub mod error;
pub mod events;
pub mod policies;
pub mod policy;
pub mod simulator;
pub mod swarm;
pub mod world;

pub use config::{EvaluationConfig, SimulatorConfig};
pub use error::{ConfigError, RuleError, SimError};
pub use events::{CompositeEventGenerator, EventGenerator, SimpleEventGenerator};
pub use policy::{DecisionContext, Policy};
pub use simulator::Simulator;
pub use swarm::{ExecutorType, FailureKind, SwarmConfig, SwarmExecutor, SwarmResult, WorldFailure};
pub use world::World;

// Re-export the data model so downstream crates need a single import
pub use sim_types;
