//! Meters
//!
//! Meter definitions and the catalog they are resolved from.
//!
//! - **types**: `Meter`, `MeterAggregation`, `WindowSize`, `MeterQueryRow`
//! - **catalog**: `MeterCatalog` trait and the in-memory implementation
//! - **error**: definition validation errors

pub mod catalog;
pub mod error;
pub mod types;

pub use catalog::{CatalogError, InMemoryCatalog, MeterCatalog};
pub use error::{MeterError, MeterResult};
pub use types::{Meter, MeterAggregation, MeterQueryRow, WindowSize, SUBJECT_DIMENSION};
