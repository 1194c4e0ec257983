//! Stochastic Events
//!
//! Event definitions and occurrence records. An [`Event`] describes something
//! that *may* happen; an [`EventOccurrence`] records that it *did*.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::value::Value;

/// Errors raised when constructing an invalid event.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    #[error("event name must not be empty")]
    EmptyName,
    #[error("probability must be 0-1, got {value} (event '{name}')")]
    InvalidProbability { name: String, value: f64 },
    #[error("severity must be 0-1, got {value} (event '{name}')")]
    InvalidSeverity { name: String, value: f64 },
}

/// Immutable definition of a stochastic event.
///
/// Probability and severity are validated at construction, so every `Event`
/// in existence has both in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    name: String,
    description: String,
    probability: f64,
    severity: f64,
    is_irreversible: bool,
    cooldown: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, Value>,
}

impl Event {
    /// Starts building an event with the given name.
    pub fn builder(name: impl Into<String>) -> EventBuilder {
        EventBuilder::new(name)
    }

    /// Unique identifier for the event
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Base probability of occurrence per timestep
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Impact magnitude, higher is more severe
    pub fn severity(&self) -> f64 {
        self.severity
    }

    pub fn is_irreversible(&self) -> bool {
        self.is_irreversible
    }

    /// Minimum timesteps before the event can fire again
    pub fn cooldown(&self) -> u64 {
        self.cooldown
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// Builds the occurrence record for this event firing at `timestep`.
    pub fn occurrence(&self, timestep: u64) -> EventOccurrence {
        EventOccurrence {
            name: self.name.clone(),
            timestep,
            severity: self.severity,
            is_irreversible: self.is_irreversible,
        }
    }
}

/// Builder for [`Event`].
#[derive(Debug, Clone)]
pub struct EventBuilder {
    name: String,
    description: String,
    probability: f64,
    severity: f64,
    is_irreversible: bool,
    cooldown: u64,
    metadata: BTreeMap<String, Value>,
}

impl EventBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            probability: 0.0,
            severity: 0.5,
            is_irreversible: false,
            cooldown: 0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn probability(mut self, probability: f64) -> Self {
        self.probability = probability;
        self
    }

    pub fn severity(mut self, severity: f64) -> Self {
        self.severity = severity;
        self
    }

    pub fn irreversible(mut self) -> Self {
        self.is_irreversible = true;
        self
    }

    pub fn cooldown(mut self, cooldown: u64) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Validates and builds the event.
    pub fn build(self) -> Result<Event, EventError> {
        if self.name.is_empty() {
            return Err(EventError::EmptyName);
        }
        // NaN fails the range check too
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(EventError::InvalidProbability {
                name: self.name,
                value: self.probability,
            });
        }
        if !(0.0..=1.0).contains(&self.severity) {
            return Err(EventError::InvalidSeverity {
                name: self.name,
                value: self.severity,
            });
        }

        Ok(Event {
            name: self.name,
            description: self.description,
            probability: self.probability,
            severity: self.severity,
            is_irreversible: self.is_irreversible,
            cooldown: self.cooldown,
            metadata: self.metadata,
        })
    }
}

/// Record of an event firing during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOccurrence {
    /// Name of the event that fired
    pub name: String,
    /// Timestep at which it fired
    pub timestep: u64,
    pub severity: f64,
    pub is_irreversible: bool,
}
