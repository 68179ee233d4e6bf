//! Cache Statistics Module
//!
//! Counts how calls to a memoized function were served.

use serde::Serialize;

// == Cache Stats ==
/// Call accounting for one memoized function.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Calls answered from the store
    pub hits: u64,
    /// Lookups that found nothing fresh.
    ///
    /// Not every miss invokes the function: in the async wrapper a caller
    /// that joins an in-flight computation, or finds the value stored while
    /// it waited for leadership, counts a miss but no invocation. Compare
    /// with `invocations` for the real call count.
    pub misses: u64,
    /// Calls that skipped the lookup because refresh was requested
    pub refreshes: u64,
    /// Times the wrapped function was actually called
    pub invocations: u64,
    /// Invocations of the wrapped function that failed
    pub failures: u64,
    /// Entries currently held, fresh or not
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses + refreshes), or 0.0 if no calls have
    /// been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.refreshes;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_refresh(&mut self) {
        self.refreshes += 1;
    }

    pub fn record_invocation(&mut self) {
        self.invocations += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
