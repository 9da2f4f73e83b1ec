//! Core error types for Stride.

use thiserror::Error;

/// Result type alias using `StrideError`.
pub type StrideResult<T> = std::result::Result<T, StrideError>;

/// Core error type for Stride operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StrideError {
    /// A structural invariant of the pipeline would be violated by an edit.
    ///
    /// Fatal for the current `apply`; the pipeline must be discarded.
    #[error("Invariant: {0}")]
    Invariant(String),

    /// Cyclic or contradictory strategy ordering, or an unknown strategy
    /// identifier. Reported before any rewrite runs.
    #[error("Configuration: {0}")]
    Configuration(String),

    /// Mutation attempted on an already-applied pipeline.
    #[error("Frozen: {0}")]
    Frozen(String),

    /// JSON serialization error.
    #[error("SerdeJson: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Internal error (bug in Stride).
    #[error("Internal: {0}")]
    Internal(String),
}

impl StrideError {
    /// Create a new `Invariant` error.
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        Self::Invariant(msg.into())
    }

    /// Create an `Invariant` error naming the offending step.
    pub fn invariant_at<S: Into<String>>(step_id: u64, msg: S) -> Self {
        Self::Invariant(format!("step {}: {}", step_id, msg.into()))
    }

    /// Create a new `Configuration` error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new `Frozen` error.
    pub fn frozen<S: Into<String>>(msg: S) -> Self {
        Self::Frozen(msg.into())
    }

    /// Create a new `Internal` error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Ensure a condition holds, returning an `Invariant` error if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::StrideError::Invariant($msg.to_string()));
        }
    };
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::StrideError::$variant(format!($($msg)*)));
        }
    };
}

/// Return early with an `Invariant` error.
#[macro_export]
macro_rules! invariant_err {
    ($($arg:tt)*) => {
        return Err($crate::StrideError::Invariant(format!($($arg)*)))
    };
}

/// Return early with a `Configuration` error.
#[macro_export]
macro_rules! config_err {
    ($($arg:tt)*) => {
        return Err($crate::StrideError::Configuration(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StrideError::invariant("duplicate label 'a'");
        assert_eq!(err.to_string(), "Invariant: duplicate label 'a'");
    }

    #[test]
    fn test_error_constructors() {
        let _ = StrideError::configuration("strategy ordering cycle");
        let _ = StrideError::frozen("pipeline already applied");
        let _ = StrideError::internal("unexpected state");

        let err = StrideError::invariant_at(7, "dangling reference");
        assert_eq!(err.to_string(), "Invariant: step 7: dangling reference");
    }

    #[test]
    fn test_ensure_macro() {
        fn check(flag: bool) -> StrideResult<()> {
            ensure!(flag, Frozen: "pipeline {} is frozen", "p1");
            Ok(())
        }

        assert!(check(true).is_ok());
        let err = check(false).unwrap_err();
        assert!(matches!(err, StrideError::Frozen(_)));
    }
}
