//! # Error Types
//!
//! Schema loading distinguishes three failures: the schema text is not Ion
//! ([`SchemaError::Parse`]), it is Ion but not a valid schema
//! ([`SchemaError::Invalid`]), or no authority could produce it
//! ([`SchemaError::Unresolvable`]). Validating data never errors; outcomes
//! are [`Violations`](crate::Violations).

use isl_core::ParseError;
use thiserror::Error;

/// Error raised while loading or constructing a schema or type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema or type definition breaks a language rule.
    #[error("{0}")]
    Invalid(String),

    /// No authority produced content for the id.
    #[error("Unable to resolve schema id '{id}' ({})", .causes.join(", "))]
    Unresolvable {
        /// The requested schema id.
        id: String,
        /// Per-authority failure messages, in authority order.
        causes: Vec<String>,
    },

    /// The schema text is not well-formed Ion.
    #[error("schema text is not valid Ion: {0}")]
    Parse(#[from] ParseError),
}

impl SchemaError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Return `SchemaError::Invalid` with the lazily built message unless `cond`.
pub(crate) fn ensure(cond: bool, message: impl FnOnce() -> String) -> Result<(), SchemaError> {
    if cond {
        Ok(())
    } else {
        Err(SchemaError::Invalid(message()))
    }
}

/// Error raised by a single [`Authority`](crate::Authority).
#[derive(Error, Debug)]
pub enum AuthorityError {
    /// The backing store could not be read.
    #[error("failed to read schema '{id}': {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored text is not valid Ion.
    #[error("schema '{id}' is not valid Ion: {source}")]
    Parse {
        id: String,
        #[source]
        source: ParseError,
    },

    /// The id would resolve outside the authority's base directory.
    #[error("schema id '{id}' escapes the authority base directory")]
    PathEscape { id: String },
}
