//! Async Memoized Function Module
//!
//! Async counterpart of [`Memoized`](crate::cache::Memoized) that also
//! de-duplicates concurrent misses: while one call computes a key, other
//! callers for that key wait for its result instead of starting their own.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, MemoStore};
use crate::clock::{Clock, SystemClock};
use crate::config::MemoOptions;
use crate::key::{CacheKey, CallArgs};

type InFlight<T, E> = Mutex<HashMap<CacheKey, broadcast::Sender<Result<T, E>>>>;

// == Async Memoized ==
/// An async function wrapped with a time-bounded result cache.
///
/// At most one computation per key is in flight at a time. Everyone waiting
/// on it receives the same `Ok` or `Err`; errors are shared but never stored.
/// If the computing caller is dropped before finishing, waiters retry and one
/// of them takes over. A refresh runs alongside any in-flight computation;
/// whichever of the two started later owns the stored entry.
pub struct AsyncMemoized<F, T, E> {
    func: F,
    options: MemoOptions,
    clock: Arc<dyn Clock>,
    store: RwLock<MemoStore<T>>,
    in_flight: InFlight<T, E>,
}

/// Wraps the async function `func` with the given options.
pub fn cached_async<F, Fut, T, E>(
    func: F,
    options: MemoOptions,
) -> crate::error::Result<AsyncMemoized<F, T, E>>
where
    F: Fn(CallArgs) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Clone,
    E: Clone,
{
    AsyncMemoized::new(func, options)
}

enum Role<T, E> {
    Leader,
    Follower(broadcast::Receiver<Result<T, E>>),
}

/// Removes the in-flight marker for a key, even if the leader is dropped.
struct FlightGuard<'a, T, E> {
    in_flight: &'a InFlight<T, E>,
    key: CacheKey,
    finished: bool,
}

impl<T, E> FlightGuard<'_, T, E> {
    fn finish(mut self) -> Option<broadcast::Sender<Result<T, E>>> {
        self.finished = true;
        self.in_flight.lock().remove(&self.key)
    }
}

impl<T, E> Drop for FlightGuard<'_, T, E> {
    fn drop(&mut self) {
        if !self.finished {
            // Dropping the sender closes the channel and wakes the waiters
            self.in_flight.lock().remove(&self.key);
        }
    }
}

impl<F, Fut, T, E> AsyncMemoized<F, T, E>
where
    F: Fn(CallArgs) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Clone,
    E: Clone,
{
    // == Constructor ==
    pub fn new(func: F, options: MemoOptions) -> crate::error::Result<Self> {
        options.validate()?;
        Ok(Self {
            func,
            options,
            clock: Arc::new(SystemClock),
            store: RwLock::new(MemoStore::new()),
            in_flight: Mutex::new(HashMap::new()),
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
    /// A truthy `refresh_` keyword forces recomputation.
    pub async fn call(&self, mut args: CallArgs) -> Result<T, E> {
        let refresh = args.take_refresh();
        self.call_inner(args, refresh).await
    }

    /// Calls the wrapped function and overwrites the stored result.
    ///
    /// Never joins a computation already in flight.
    pub async fn call_refresh(&self, mut args: CallArgs) -> Result<T, E> {
        args.take_refresh();
        self.call_inner(args, true).await
    }

    async fn call_inner(&self, args: CallArgs, refresh: bool) -> Result<T, E> {
        let key = args.cache_key();

        if refresh {
            self.store.write().await.record_refresh();
            debug!("Refresh requested for key {}", key.short());
            return self.invoke(key, args, self.clock.now()).await;
        }

        loop {
            let now = self.clock.now();
            let cached = self.store.write().await.lookup(&key, now, self.options.maxage);
            if let Some(value) = cached {
                debug!("Cache hit for key {}", key.short());
                return Ok(value);
            }

            let role = {
                let mut in_flight = self.in_flight.lock();
                match in_flight.get(&key) {
                    Some(sender) => Role::Follower(sender.subscribe()),
                    None => {
                        let (sender, _) = broadcast::channel(1);
                        in_flight.insert(key, sender);
                        Role::Leader
                    }
                }
            };

            match role {
                Role::Follower(mut receiver) => {
                    debug!("Waiting on in-flight call for key {}", key.short());
                    match receiver.recv().await {
                        Ok(result) => return result,
                        Err(_) => {
                            debug!("In-flight call for key {} abandoned, retrying", key.short());
                            continue;
                        }
                    }
                }
                Role::Leader => {
                    let guard = FlightGuard {
                        in_flight: &self.in_flight,
                        key,
                        finished: false,
                    };

                    // Another leader may have stored a result since our lookup
                    let result = match self.peek_fresh(&key, now).await {
                        Some(value) => Ok(value),
                        None => {
                            debug!("Cache miss for key {}", key.short());
                            self.invoke(key, args, now).await
                        }
                    };

                    if let Some(sender) = guard.finish() {
                        // No receivers is fine
                        let _ = sender.send(result.clone());
                    }
                    return result;
                }
            }
        }
    }

    async fn peek_fresh(&self, key: &CacheKey, now: f64) -> Option<T> {
        let store = self.store.read().await;
        store
            .peek(key)
            .filter(|entry| entry.is_fresh(now, self.options.maxage))
            .map(|entry| entry.value.clone())
    }

    async fn invoke(&self, key: CacheKey, args: CallArgs, now: f64) -> Result<T, E> {
        let generation = self.store.write().await.begin_invocation();
        let cacheable = args.is_cacheable();
        let pins = args.pins();

        match (self.func)(args).await {
            Ok(value) => {
                if !cacheable {
                    debug!("Result for key {} not cached, arguments are unkeyable", key.short());
                    return Ok(value);
                }
                let entry = CacheEntry::new(value.clone(), now)
                    .with_generation(generation)
                    .with_pins(pins);
                if !self.store.write().await.insert_entry(key, entry) {
                    debug!("Result for key {} superseded by a later call", key.short());
                }
                Ok(value)
            }
            Err(err) => {
                self.store.write().await.record_failure();
                warn!("Wrapped call failed for key {}, result not cached", key.short());
                Err(err)
            }
        }
    }
}

impl<F, T, E> AsyncMemoized<F, T, E> {
    // == Store Management ==
    /// Drops the stored result for `args`, if any.
    pub async fn invalidate(&self, args: &CallArgs) -> bool {
        let mut args = args.clone();
        args.take_refresh();
        self.store.write().await.invalidate(&args.cache_key())
    }

    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    /// Evicts entries that are no longer fresh. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        self.store
            .write()
            .await
            .purge_expired(now, self.options.maxage)
    }

    pub fn maxage(&self) -> f64 {
        self.options.maxage
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    /// Number of keys currently being computed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl<F, T, E> fmt::Debug for AsyncMemoized<F, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncMemoized")
            .field("maxage", &self.options.maxage)
            .field("clock", &self.clock)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
