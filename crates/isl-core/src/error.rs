//! # Error Types
//!
//! Errors raised while turning Ion text into [`Value`](crate::Value)s.
//! Every variant carries enough context to point at the offending input.

use thiserror::Error;

/// Error produced by the Ion text reader and by validated constructors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input is not well-formed Ion text.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// 1-based line of the failure.
        line: usize,
        /// 1-based column (in characters) of the failure.
        column: usize,
        /// What the reader expected or rejected.
        message: String,
    },

    /// A timestamp is well-formed lexically but names an impossible instant.
    #[error("invalid timestamp: {reason}")]
    InvalidTimestamp {
        /// Which component is out of range.
        reason: String,
    },

    /// Exactly one value was requested but the input held a different count.
    #[error("expected exactly one value, found {found}")]
    ValueCount {
        /// Number of top-level values present.
        found: usize,
    },
}
