//! # Meterscope
//!
//! Query service for usage meters: named, windowed aggregations over a stream
//! of timestamped events. Clients query pre-aggregated values over arbitrary
//! time ranges, group-by dimensions and filters, as JSON or CSV.
//!
//! ## Features
//!
//! - **Validated queries**: request parameters are checked against the
//!   meter's declared dimensions and window granularity
//! - **Filter expressions**: a small JSON predicate language per dimension
//! - **Time zones**: window alignment in any IANA zone
//! - **JSON and CSV**: negotiated from the `Accept` header
//!
//! ## Modules
//!
//! - [`meter`]: Meter definitions and the meter catalog
//! - [`filter`]: Filter expressions
//! - [`query`]: Query parameters and the query builder
//! - [`backend`]: Aggregation backends
//! - [`render`]: JSON and CSV response rendering
//! - [`service`]: The meter query pipeline
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meterscope::backend::InMemoryBackend;
//! use meterscope::meter::{InMemoryCatalog, Meter, MeterAggregation, WindowSize};
//! use meterscope::query::RawQueryParams;
//! use meterscope::render::ResponseFormat;
//! use meterscope::service::QueryMeterService;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let meter = Meter::new("api_requests", MeterAggregation::Count, "request")
//!         .window_size(WindowSize::Hour)
//!         .group_by("method", "$.method");
//!     let catalog = InMemoryCatalog::from_meters("default", [meter])?;
//!
//!     let service = QueryMeterService::new(Arc::new(catalog), Arc::new(InMemoryBackend::new()));
//!
//!     let raw = RawQueryParams::new().group_by("method").subject("customer-1");
//!     let response = service
//!         .query_meter("default", "api_requests", &raw, ResponseFormat::Csv)
//!         .await?;
//!
//!     println!("{}", String::from_utf8_lossy(&response.body));
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod backend;
pub mod config;
pub mod filter;
pub mod meter;
pub mod query;
pub mod render;
pub mod service;

// Re-export top-level types for convenience
pub use meter::{
    CatalogError, InMemoryCatalog, Meter, MeterAggregation, MeterCatalog, MeterError,
    MeterQueryRow, WindowSize,
};

pub use filter::{parse_filter, validate_filter, Filter, FilterError};

pub use query::{build_query, QueryBuilder, QueryError, QueryParams, QueryParamsError, RawQueryParams};

pub use backend::{AggregationBackend, BackendError, InMemoryBackend};

pub use render::{negotiate_format, QueryMeterResponse, RenderedResponse, ResponseFormat};

pub use service::{ErrorHandler, QueryMeterError, QueryMeterService, TracingErrorHandler};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};
