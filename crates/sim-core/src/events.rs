//! Stochastic Event Layer
//!
//! Event generators decide which events fire on a timestep and how they
//! change the world. Cooldown tracking is generator-owned and lives exactly
//! as long as the world that owns the generator.

use rand::{Rng, RngCore};
use sim_types::{Event, WorldState};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Scales an event's base probability from the current state.
pub type ProbabilityModifier = Arc<dyn Fn(&WorldState) -> f64 + Send + Sync>;

/// Domain-specific state change applied when an event fires.
///
/// Unless the generator was built with
/// [`SimpleEventGenerator::without_handled_recording`], the state passed in
/// already carries the occurrence in its metadata.
pub type EventHandler = Arc<dyn Fn(&WorldState, &Event, &mut dyn RngCore) -> WorldState + Send + Sync>;

/// A source of stochastic events.
pub trait EventGenerator {
    /// Every event this generator can produce.
    fn events(&self) -> Vec<&Event>;

    /// True if this generator declares an event with the given name.
    fn owns(&self, name: &str) -> bool {
        self.events().iter().any(|e| e.name() == name)
    }

    /// Samples the events that fire this timestep.
    fn sample_events(&mut self, state: &WorldState, rng: &mut dyn RngCore) -> Vec<Event>;

    /// Applies one fired event to the state.
    fn apply_event(&self, state: &WorldState, event: &Event, rng: &mut dyn RngCore) -> WorldState;

    /// Clears run-scoped state such as cooldowns.
    fn reset(&mut self) {}
}

/// Records an occurrence of `event` in the state's metadata.
pub fn record_occurrence(state: &WorldState, event: &Event) -> WorldState {
    let metadata = state.metadata().with_occurrence(event.occurrence(state.timestep()));
    state.evolve(sim_types::StateUpdate::new().metadata(metadata))
}

/// Event generator with independent per-event probabilities.
///
/// Each event not in cooldown gets one uniform draw per timestep and fires
/// iff the draw is below `probability × modifier(state)`, clamped to `[0, 1]`.
/// Applying an event records the occurrence; a custom handler, if
/// registered, then performs the domain change. Generators built with
/// [`without_handled_recording`](Self::without_handled_recording) leave
/// recording of handled events to the handler.
#[derive(Clone, Default)]
pub struct SimpleEventGenerator {
    events: Vec<Event>,
    modifiers: HashMap<String, ProbabilityModifier>,
    handlers: HashMap<String, EventHandler>,
    /// Earliest timestep at which each event may fire again
    cooldowns: HashMap<String, u64>,
    /// Handlers record their own occurrences
    handlers_record: bool,
}

impl SimpleEventGenerator {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    /// Registers a probability modifier for the named event.
    pub fn with_modifier<F>(mut self, name: impl Into<String>, modifier: F) -> Self
    where
        F: Fn(&WorldState) -> f64 + Send + Sync + 'static,
    {
        self.modifiers.insert(name.into(), Arc::new(modifier));
        self
    }

    /// Registers a custom handler for the named event.
    pub fn with_handler<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&WorldState, &Event, &mut dyn RngCore) -> WorldState + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Stops recording occurrences of events that have a custom handler.
    ///
    /// Events without a handler are still recorded. A handler that wants the
    /// occurrence logged can call [`record_occurrence`] itself.
    pub fn without_handled_recording(mut self) -> Self {
        self.handlers_record = true;
        self
    }

    /// Probability the event fires in `state`, ignoring cooldown.
    pub fn effective_probability(&self, event: &Event, state: &WorldState) -> f64 {
        let modifier = self
            .modifiers
            .get(event.name())
            .map(|m| m(state))
            .unwrap_or(1.0);
        let p = event.probability() * modifier;
        if p.is_nan() {
            0.0
        } else {
            p.clamp(0.0, 1.0)
        }
    }

    /// True if the event may not fire at `timestep`.
    pub fn in_cooldown(&self, name: &str, timestep: u64) -> bool {
        self.cooldowns.get(name).is_some_and(|&until| timestep < until)
    }

    /// Resets all cooldown trackers.
    pub fn reset_cooldowns(&mut self) {
        self.cooldowns.clear();
    }
}

impl fmt::Debug for SimpleEventGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleEventGenerator")
            .field("events", &self.events.iter().map(Event::name).collect::<Vec<_>>())
            .field("modifiers", &self.modifiers.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("cooldowns", &self.cooldowns)
            .field("handlers_record", &self.handlers_record)
            .finish()
    }
}

impl EventGenerator for SimpleEventGenerator {
    fn events(&self) -> Vec<&Event> {
        self.events.iter().collect()
    }

    fn sample_events(&mut self, state: &WorldState, rng: &mut dyn RngCore) -> Vec<Event> {
        let timestep = state.timestep();
        let mut fired = Vec::new();

        for event in &self.events {
            if self.in_cooldown(event.name(), timestep) {
                continue;
            }

            let p = self.effective_probability(event, state);
            if rng.gen::<f64>() < p {
                fired.push(event.clone());
            }
        }

        for event in &fired {
            if event.cooldown() > 0 {
                self.cooldowns
                    .insert(event.name().to_string(), timestep + event.cooldown());
            }
        }

        if !fired.is_empty() {
            tracing::debug!(
                timestep,
                events = ?fired.iter().map(Event::name).collect::<Vec<_>>(),
                "events fired"
            );
        }

        fired
    }

    fn apply_event(&self, state: &WorldState, event: &Event, rng: &mut dyn RngCore) -> WorldState {
        match self.handlers.get(event.name()) {
            Some(handler) if self.handlers_record => handler(state, event, rng),
            Some(handler) => handler(&record_occurrence(state, event), event, rng),
            None => record_occurrence(state, event),
        }
    }

    fn reset(&mut self) {
        self.reset_cooldowns();
    }
}

/// Combines several generators, e.g. one per category of event.
///
/// Sampling runs every sub-generator in order; application is delegated to
/// the sub-generator that declares the fired event.
#[derive(Default)]
pub struct CompositeEventGenerator {
    generators: Vec<Box<dyn EventGenerator + Send>>,
}

impl CompositeEventGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generator(mut self, generator: impl EventGenerator + Send + 'static) -> Self {
        self.generators.push(Box::new(generator));
        self
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

impl EventGenerator for CompositeEventGenerator {
    fn events(&self) -> Vec<&Event> {
        self.generators.iter().flat_map(|g| g.events()).collect()
    }

    fn sample_events(&mut self, state: &WorldState, rng: &mut dyn RngCore) -> Vec<Event> {
        let mut fired = Vec::new();
        for generator in &mut self.generators {
            fired.extend(generator.sample_events(state, rng));
        }
        fired
    }

    fn apply_event(&self, state: &WorldState, event: &Event, rng: &mut dyn RngCore) -> WorldState {
        match self.generators.iter().find(|g| g.owns(event.name())) {
            Some(generator) => generator.apply_event(state, event, rng),
            None => {
                tracing::debug!(event = event.name(), "no generator owns event, ignoring");
                state.clone()
            }
        }
    }

    fn reset(&mut self) {
        for generator in &mut self.generators {
            generator.reset();
        }
    }
}
