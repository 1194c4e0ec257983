//! Shared data types for the decision robustness workspace.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is a dependency for all other crates in the workspace.

pub mod action;
pub mod event;
pub mod result;
pub mod state;
pub mod value;

// Re-export value types
pub use value::Value;

// Re-export state types
pub use state::{StateMetadata, StateUpdate, TerminalReason, WorldState};

// Re-export action types
pub use action::{Action, ActionType, ParseActionTypeError};

// Re-export event types
pub use event::{Event, EventBuilder, EventError, EventOccurrence};

// Re-export result types
pub use result::{Outcome, SimulationResult, TrajectoryStep};
