//! Cache Module
//!
//! Time-bounded memoization: per-function result stores and the sync and
//! async wrappers that consult them.

mod async_memoized;
mod entry;
mod memoized;
mod stats;
mod store;


// Re-export public types
pub use async_memoized::{cached_async, AsyncMemoized};
pub use entry::CacheEntry;
pub use memoized::{cached, Memoized};
pub use stats::CacheStats;
pub use store::MemoStore;
