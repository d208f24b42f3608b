//! Filter error types

use thiserror::Error;

/// Errors raised while parsing or validating a filter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// The text is not a well-formed filter
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The filter is well-formed but not acceptable
    #[error("{0}")]
    Invalid(String),
}

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;
