//! Meter definition errors

use thiserror::Error;

use crate::meter::types::MeterAggregation;

/// Errors raised while validating meter definitions
#[derive(Error, Debug)]
pub enum MeterError {
    /// Slug is empty or has characters outside `[a-z0-9_-]`
    #[error("invalid meter slug: '{0}'")]
    InvalidSlug(String),

    /// Event type is blank
    #[error("meter {0}: event type is required")]
    EmptyEventType(String),

    /// Non-COUNT aggregation without a value property
    #[error("meter {slug}: value property is required for {aggregation} aggregation")]
    MissingValueProperty {
        slug: String,
        aggregation: MeterAggregation,
    },

    /// COUNT aggregation with a value property
    #[error("meter {0}: value property is not allowed for COUNT aggregation")]
    UnexpectedValueProperty(String),

    /// Group-by key is empty or shadows the subject dimension
    #[error("meter {slug}: invalid group by key '{key}'")]
    InvalidGroupByKey { slug: String, key: String },

    /// Group-by path is blank
    #[error("meter {slug}: group by '{key}' has an empty path")]
    EmptyGroupByPath { slug: String, key: String },

    /// Two meters share a slug in one namespace
    #[error("duplicate meter slug '{slug}' in namespace '{namespace}'")]
    DuplicateSlug { namespace: String, slug: String },

    /// Window size name is not recognized
    #[error("unknown window size: '{0}'")]
    UnknownWindowSize(String),
}

/// Result type for meter operations
pub type MeterResult<T> = Result<T, MeterError>;
