//! Background Tasks Module
//!
//! Background tasks that run alongside memoized functions.
//!
//! # Tasks
//! - Expiry purge: evicts entries that are past their maxage

mod purge;

pub use purge::spawn_purge_task;
