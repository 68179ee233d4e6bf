//! Time Source Module
//!
//! The memoizer reads "now" through the [`Clock`] trait only, so tests can
//! pin time to any epoch value and step it across expiry boundaries.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

// == Clock Trait ==
/// Source of the current time in epoch seconds.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time as fractional seconds since the Unix epoch.
    fn now(&self) -> f64;
}

// == System Clock ==
/// Wall-clock time from the system, in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        let now = Utc::now();
        now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
    }
}

// == Manual Clock ==
/// A clock that only moves when told to.
///
/// Clones share the same reading, so a test can keep one handle while the
/// memoizer holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    /// f64 bits of the current reading
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock pinned at `now`.
    pub fn new(now: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(now.to_bits())),
        }
    }

    /// Pins the clock to `now`. Moving backwards is allowed.
    pub fn set(&self, now: f64) {
        self.bits.store(now.to_bits(), Ordering::SeqCst);
    }

    /// Moves the clock by `secs` (may be negative).
    pub fn advance(&self, secs: f64) {
        self.set(self.now() + secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}
