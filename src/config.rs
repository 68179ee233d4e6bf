//! Configuration Module
//!
//! Options accepted when wrapping a function, with loading from environment
//! variables.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MemoError, Result};

/// Default maximum age of a cached result, in seconds.
pub const DEFAULT_MAXAGE: f64 = 300.0;

/// Environment variable read by [`MemoOptions::from_env`].
pub const MAXAGE_ENV: &str = "MEMO_MAXAGE";

/// Options for a memoized function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoOptions {
    /// Seconds a stored result stays fresh. `f64::INFINITY` never expires.
    pub maxage: f64,
}

impl MemoOptions {
    /// Creates validated options with the given maxage in seconds.
    ///
    /// Negative or NaN values are rejected here so a bad configuration
    /// surfaces when the function is wrapped, not on its first call.
    pub fn new(maxage: f64) -> Result<Self> {
        let options = Self { maxage };
        options.validate()?;
        Ok(options)
    }

    /// Creates options from a `Duration`. Always valid.
    pub fn from_duration(maxage: Duration) -> Self {
        Self {
            maxage: maxage.as_secs_f64(),
        }
    }

    /// Loads options from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMO_MAXAGE` - maxage in seconds (default: 300)
    ///
    /// A variable that is set but does not hold a valid value is an error
    /// rather than a silent fallback to the default.
    pub fn from_env() -> Result<Self> {
        let raw = env::var(MAXAGE_ENV).ok();
        Self::new(parse_maxage(raw.as_deref())?)
    }

    /// Checks that maxage is a usable number of seconds.
    pub fn validate(&self) -> Result<()> {
        if self.maxage.is_nan() {
            return Err(MemoError::InvalidMaxAge("maxage is NaN".to_string()));
        }
        if self.maxage < 0.0 {
            return Err(MemoError::InvalidMaxAge(format!(
                "maxage must be non-negative, got {}",
                self.maxage
            )));
        }
        Ok(())
    }
}

impl Default for MemoOptions {
    fn default() -> Self {
        Self {
            maxage: DEFAULT_MAXAGE,
        }
    }
}

fn parse_maxage(raw: Option<&str>) -> Result<f64> {
    match raw {
        None => Ok(DEFAULT_MAXAGE),
        Some(value) => value.trim().parse::<f64>().map_err(|_| {
            MemoError::InvalidConfig(format!("{}={} is not a number", MAXAGE_ENV, value))
        }),
    }
}
