//! Cache Entry Module
//!
//! A stored result together with the time it was computed.

use crate::key::Pinned;

// == Cache Entry ==
/// One stored result. Entries are replaced, never mutated.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The result returned by the wrapped function
    pub value: T,
    /// Creation timestamp (epoch seconds)
    pub created_at: f64,
    /// Start order of the invocation that produced the value. A store never
    /// replaces an entry with one from an earlier invocation.
    pub generation: u64,
    /// Identity-keyed arguments of the call, held so their addresses stay
    /// unique while this entry exists
    pub pins: Vec<Pinned>,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry stamped with `now`.
    pub fn new(value: T, now: f64) -> Self {
        Self {
            value,
            created_at: now,
            generation: 0,
            pins: Vec::new(),
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_pins(mut self, pins: Vec<Pinned>) -> Self {
        self.pins = pins;
        self
    }

    // == Age ==
    /// Seconds since the entry was created. Negative if the clock went back.
    pub fn age(&self, now: f64) -> f64 {
        now - self.created_at
    }

    // == Is Fresh ==
    /// Checks whether the entry may still be served.
    ///
    /// Boundary condition: an entry exactly `maxage` seconds old is still
    /// fresh; one second later it is not. With `maxage = 0` only a lookup at
    /// the creation instant hits.
    pub fn is_fresh(&self, now: f64, maxage: f64) -> bool {
        self.age(now) <= maxage
    }
}
