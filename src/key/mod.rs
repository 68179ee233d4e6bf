//! Key Module
//!
//! Argument capture and cache key derivation.

mod args;
mod encode;
mod ser;

pub use args::{Arg, CallArgs, Pinned, REFRESH_PARAM};
pub use encode::{canonical_bytes, CacheKey};
pub use ser::Unkeyable;
