//! Memo Store Module
//!
//! Keyed storage of results for a single memoized function.

use std::collections::HashMap;

use crate::cache::{CacheEntry, CacheStats};
use crate::key::CacheKey;

// == Memo Store ==
/// Results of one memoized function, keyed by argument set.
///
/// Expired entries stay in memory until overwritten or purged; lookups
/// simply ignore them.
#[derive(Debug)]
pub struct MemoStore<T> {
    /// Key-value storage
    entries: HashMap<CacheKey, CacheEntry<T>>,
    /// Call accounting
    stats: CacheStats,
    /// Last generation handed out by `begin_invocation` or `insert`
    generation: u64,
}

impl<T> Default for MemoStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoStore<T> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            generation: 0,
        }
    }

    // == Lookup ==
    /// Returns the stored value for `key` if it is fresh at `now`.
    ///
    /// Counts a hit or a miss.
    pub fn lookup(&mut self, key: &CacheKey, now: f64, maxage: f64) -> Option<T>
    where
        T: Clone,
    {
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now, maxage) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            _ => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Begin Invocation ==
    /// Counts an invocation of the wrapped function and returns its
    /// generation. Generations increase in the order invocations start.
    pub fn begin_invocation(&mut self) -> u64 {
        self.stats.record_invocation();
        self.next_generation()
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    // == Insert ==
    /// Stores `value` under `key` stamped with `now`, replacing any entry.
    pub fn insert(&mut self, key: CacheKey, value: T, now: f64) {
        let generation = self.next_generation();
        self.insert_entry(key, CacheEntry::new(value, now).with_generation(generation));
    }

    /// Stores `entry` unless the current entry for `key` comes from a later
    /// invocation. Returns whether the entry was stored.
    ///
    /// A slow invocation that finishes after a newer one (typically a
    /// refresh) cannot roll the stored value back.
    pub fn insert_entry(&mut self, key: CacheKey, entry: CacheEntry<T>) -> bool {
        if let Some(current) = self.entries.get(&key) {
            if current.generation > entry.generation {
                return false;
            }
        }
        self.entries.insert(key, entry);
        self.stats.set_total_entries(self.entries.len());
        true
    }

    // == Invalidate ==
    /// Drops the entry for `key`. Returns whether one existed.
    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        let removed = self.entries.remove(key).is_some();
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Clear ==
    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.set_total_entries(0);
    }

    // == Purge Expired ==
    /// Removes all entries that are no longer fresh at `now`.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&mut self, now: f64, maxage: f64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now, maxage));
        self.stats.set_total_entries(self.entries.len());
        before - self.entries.len()
    }

    pub fn record_refresh(&mut self) {
        self.stats.record_refresh();
    }

    pub fn record_failure(&mut self) {
        self.stats.record_failure();
    }

    /// Returns the entry for `key` whatever its age.
    pub fn peek(&self, key: &CacheKey) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
