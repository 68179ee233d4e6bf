//! TTL Memo - time-bounded memoization of function calls
//!
//! Wraps a function so repeated calls with the same arguments are answered
//! from a per-function store until the stored result is older than `maxage`.
//! A truthy `refresh_` keyword forces recomputation, and failed calls are
//! never stored.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod key;
pub mod tasks;

pub use cache::{cached, cached_async, AsyncMemoized, CacheStats, Memoized};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MemoOptions;
pub use error::{MemoError, Result};
pub use key::{Arg, CacheKey, CallArgs, Pinned, Unkeyable, REFRESH_PARAM};
pub use tasks::spawn_purge_task;
