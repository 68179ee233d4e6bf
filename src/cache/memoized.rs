//! Memoized Function Module
//!
//! Synchronous wrapper that serves repeated calls from a TTL store.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, MemoStore};
use crate::clock::{Clock, SystemClock};
use crate::config::MemoOptions;
use crate::key::{CacheKey, CallArgs};

// == Memoized ==
/// A function wrapped with a time-bounded result cache.
///
/// Each wrapper owns its store, so two wrapped functions never see each
/// other's results even when called with identical arguments. Failed calls
/// are returned as-is and leave the store untouched.
///
/// The wrapped function runs without any lock held. Concurrent misses on the
/// same key may therefore each invoke it. The store keeps the result of
/// the invocation that started last, whatever order they finish in.
pub struct Memoized<F, T, E> {
    func: F,
    options: MemoOptions,
    clock: Arc<dyn Clock>,
    store: RwLock<MemoStore<T>>,
    _error: PhantomData<fn() -> E>,
}

/// Wraps `func` with the given options.
///
/// Fails if the options are invalid.
pub fn cached<F, T, E>(func: F, options: MemoOptions) -> crate::error::Result<Memoized<F, T, E>>
where
    F: Fn(&CallArgs) -> Result<T, E>,
    T: Clone,
{
    Memoized::new(func, options)
}

impl<F, T, E> Memoized<F, T, E>
where
    F: Fn(&CallArgs) -> Result<T, E>,
    T: Clone,
{
    // == Constructor ==
    /// Wraps `func`, reading time from the system clock.
    pub fn new(func: F, options: MemoOptions) -> crate::error::Result<Self> {
        options.validate()?;
        Ok(Self {
            func,
            options,
            clock: Arc::new(SystemClock),
            store: RwLock::new(MemoStore::new()),
            _error: PhantomData,
        })
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // == Call ==
    /// Calls the wrapped function through the cache.
    ///
    /// A truthy `refresh_` keyword forces recomputation; it is removed before
    /// the key is derived and before the function sees the arguments.
    pub fn call(&self, mut args: CallArgs) -> Result<T, E> {
        let refresh = args.take_refresh();
        self.call_inner(args, refresh)
    }

    /// Calls the wrapped function and overwrites the stored result.
    pub fn call_refresh(&self, mut args: CallArgs) -> Result<T, E> {
        args.take_refresh();
        self.call_inner(args, true)
    }

    fn call_inner(&self, args: CallArgs, refresh: bool) -> Result<T, E> {
        let key = args.cache_key();
        let now = self.clock.now();

        if refresh {
            self.store.write().record_refresh();
            debug!("Refresh requested for key {}", key.short());
        } else {
            // Bind before matching so the write guard is released here
            let cached = self.store.write().lookup(&key, now, self.options.maxage);
            if let Some(value) = cached {
                debug!("Cache hit for key {}", key.short());
                return Ok(value);
            }
            debug!("Cache miss for key {}", key.short());
        }

        self.invoke(key, &args, now)
    }

    fn invoke(&self, key: CacheKey, args: &CallArgs, now: f64) -> Result<T, E> {
        let generation = self.store.write().begin_invocation();
        match (self.func)(args) {
            Ok(value) => {
                if !args.is_cacheable() {
                    debug!("Result for key {} not cached, arguments are unkeyable", key.short());
                    return Ok(value);
                }
                let entry = CacheEntry::new(value.clone(), now)
                    .with_generation(generation)
                    .with_pins(args.pins());
                if !self.store.write().insert_entry(key, entry) {
                    debug!("Result for key {} superseded by a later call", key.short());
                }
                Ok(value)
            }
            Err(err) => {
                self.store.write().record_failure();
                warn!("Wrapped call failed for key {}, result not cached", key.short());
                Err(err)
            }
        }
    }
}

impl<F, T, E> Memoized<F, T, E> {
    // == Store Management ==
    /// Drops the stored result for `args`, if any.
    pub fn invalidate(&self, args: &CallArgs) -> bool {
        let mut args = args.clone();
        args.take_refresh();
        self.store.write().invalidate(&args.cache_key())
    }

    /// Drops every stored result.
    pub fn clear(&self) {
        self.store.write().clear();
    }

    /// Evicts entries that are no longer fresh. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        self.store.write().purge_expired(now, self.options.maxage)
    }

    pub fn maxage(&self) -> f64 {
        self.options.maxage
    }

    pub fn stats(&self) -> CacheStats {
        self.store.read().stats()
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }
}

impl<F, T, E> fmt::Debug for Memoized<F, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("maxage", &self.options.maxage)
            .field("clock", &self.clock)
            .field("entries", &self.len())
            .finish()
    }
}
