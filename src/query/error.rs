//! Query error types
//!
//! Every variant is a client error: the builder stops at the first one.

use thiserror::Error;

use crate::filter::FilterError;
use crate::meter::WindowSize;

/// Errors raised while building a meter query from request parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Group-by key is neither `subject` nor declared on the meter
    #[error("invalid group by: {0}")]
    InvalidGroupBy(String),

    /// Filter key is neither `subject` nor declared on the meter
    #[error("invalid group by filter: {0}")]
    InvalidGroupByFilter(String),

    /// Filter text could not be parsed
    #[error("invalid {key} filter ({filter}): {source}")]
    InvalidFilterSyntax {
        key: String,
        filter: String,
        source: FilterError,
    },

    /// Filter parsed but failed validation
    #[error("invalid {key} filter ({filter}): {source}")]
    InvalidFilter {
        key: String,
        filter: String,
        source: FilterError,
    },

    /// Time zone name is not in the zone database
    #[error("invalid time zone: {0}")]
    InvalidTimeZone(String),

    /// Range, window and zone do not fit together
    #[error("invalid query parameters: {0}")]
    InvalidQueryParams(#[from] QueryParamsError),
}

/// Cross-validation failures of [`crate::query::QueryParams`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryParamsError {
    /// `from` equals `to`
    #[error("from and to cannot be equal")]
    EmptyRange,

    /// `from` is after `to`
    #[error("from must be before to")]
    InvertedRange,

    /// Requested window is finer than the meter's own
    #[error("cannot query meter aggregating on {meter} window size with {requested} window size")]
    WindowTooFine {
        meter: WindowSize,
        requested: WindowSize,
    },

    /// `from` is not on a window boundary
    #[error("from must be aligned to window size {0}")]
    UnalignedFrom(WindowSize),

    /// `to` is not on a window boundary
    #[error("to must be aligned to window size {0}")]
    UnalignedTo(WindowSize),
}

/// Result type for query building
pub type QueryResult<T> = Result<T, QueryError>;
