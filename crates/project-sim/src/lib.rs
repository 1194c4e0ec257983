//! Software project example domain.
//!
//! A week-by-week software project world, three rule-based management
//! strategies, and the evaluation pipeline behind the `robustness` binary.

pub mod actions;
pub mod config;
pub mod evaluation;
pub mod policies;
pub mod world;

pub use actions::{project_actions, ActionEffect, ProjectAction, UnknownProjectAction};
pub use config::{ProjectConfig, ProjectConfigError, RobustnessConfig, RobustnessConfigError};
pub use evaluation::{compare_policies, comparison_table, EvaluationError, PolicyEvaluation};
pub use policies::{aggressive, balanced, conservative, PolicyKind, UnknownPolicy};
pub use world::{project_events, FailureCause, ProjectWorld, ProjectWorldError};
