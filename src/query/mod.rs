//! Meter Queries
//!
//! Validation of request parameters against a meter's declared schema:
//!
//! - **Params**: the typed `QueryParams` handed to the aggregation backend
//! - **Builder**: raw request parameters + meter → `QueryParams`
//! - **Error**: the client-facing failure taxonomy
//!
//! # Example
//!
//! ```rust
//! use meterscope::meter::{Meter, MeterAggregation, WindowSize};
//! use meterscope::query::{build_query, RawQueryParams};
//!
//! let meter = Meter::new("api_calls", MeterAggregation::Count, "request")
//!     .window_size(WindowSize::Hour)
//!     .group_by("region", "$.region");
//!
//! let raw = RawQueryParams::new()
//!     .group_by("region")
//!     .subject("customer-1")
//!     .filter("region", r#"{"$ne": "test"}"#);
//!
//! let params = build_query(&meter, &raw).unwrap();
//! assert_eq!(params.group_by, vec!["region", "subject"]);
//! ```

mod builder;
mod error;
mod params;

pub use builder::{apply_subjects, build_query, resolve_time_zone, QueryBuilder, RawQueryParams};
pub use error::{QueryError, QueryParamsError, QueryResult};
pub use params::QueryParams;
