//! Aggregation Backends
//!
//! The aggregation backend computes meter values; the query pipeline only
//! hands it validated [`QueryParams`] and reads back rows. Rows come back
//! one per (window, group-by combination) in no particular order.
//!
//! Backend calls are plain futures: dropping the future (for example when
//! the HTTP request goes away) abandons the call.

mod memory;

pub use memory::{FixtureSet, InMemoryBackend};

use async_trait::async_trait;
use thiserror::Error;

use crate::meter::MeterQueryRow;
use crate::query::QueryParams;

/// Backend failures
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend cannot be reached
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Fixture data could not be read
    #[error("fixture error: {0}")]
    Fixture(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Source of pre-aggregated meter values
#[async_trait]
pub trait AggregationBackend: Send + Sync {
    /// Query the values of a meter
    async fn query_meter(
        &self,
        namespace: &str,
        meter_slug: &str,
        params: &QueryParams,
    ) -> BackendResult<Vec<MeterQueryRow>>;

    /// List the distinct subjects that have values for a meter
    async fn list_meter_subjects(
        &self,
        namespace: &str,
        meter_slug: &str,
    ) -> BackendResult<Vec<String>>;
}
