//! Error types for the memoizer
//!
//! Only configuration problems are errors of this crate. Failures of a
//! wrapped callable are handed back to the caller as the callable's own
//! error type and never pass through here.

use thiserror::Error;

// == Memo Error Enum ==
/// Errors raised while configuring a memoized function.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoError {
    /// maxage is negative or not a number
    #[error("Invalid maxage: {0}")]
    InvalidMaxAge(String),

    /// A configuration source held a value that could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for memoizer configuration.
pub type Result<T> = std::result::Result<T, MemoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MemoError::InvalidMaxAge("-1".to_string());
        assert_eq!(err.to_string(), "Invalid maxage: -1");

        let err = MemoError::InvalidConfig("MEMO_MAXAGE=abc".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: MEMO_MAXAGE=abc");
    }
}
