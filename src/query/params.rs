//! Normalized meter query parameters

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

use crate::filter::Filter;
use crate::meter::{MeterAggregation, WindowSize};
use crate::query::error::QueryParamsError;

/// A typed, validated query against one meter
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    /// Range start (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// Range end (exclusive)
    pub to: Option<DateTime<Utc>>,
    /// Window size; `None` collapses the range into one bucket per group
    pub window_size: Option<WindowSize>,
    /// Zone window boundaries are aligned in; `None` means UTC
    pub window_time_zone: Option<Tz>,
    /// Group-by dimensions in request order, `subject` included
    pub group_by: Vec<String>,
    /// Predicate over subject values
    pub filter_subject: Option<Filter>,
    /// Predicates over declared group-by dimensions
    pub filter_group_by: BTreeMap<String, Filter>,
    /// Aggregation, copied from the meter
    pub aggregation: MeterAggregation,
}

impl QueryParams {
    /// Empty parameters for a meter aggregation
    pub fn new(aggregation: MeterAggregation) -> Self {
        Self {
            from: None,
            to: None,
            window_size: None,
            window_time_zone: None,
            group_by: Vec::new(),
            filter_subject: None,
            filter_group_by: BTreeMap::new(),
            aggregation,
        }
    }

    /// Zone used for window alignment
    pub fn time_zone(&self) -> Tz {
        self.window_time_zone.unwrap_or(Tz::UTC)
    }

    /// Whether `key` is among the group-by dimensions
    pub fn groups_by(&self, key: &str) -> bool {
        self.group_by.iter().any(|k| k == key)
    }

    /// Check the range, window and zone against the meter's window size.
    ///
    /// A query without a window size is always acceptable window-wise; a
    /// query with one must not be finer than the meter and its bounds must
    /// sit on window boundaries in the query's zone.
    pub fn validate(&self, meter_window_size: WindowSize) -> Result<(), QueryParamsError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from == to {
                return Err(QueryParamsError::EmptyRange);
            }
            if from > to {
                return Err(QueryParamsError::InvertedRange);
            }
        }

        if let Some(window_size) = self.window_size {
            if window_size < meter_window_size {
                return Err(QueryParamsError::WindowTooFine {
                    meter: meter_window_size,
                    requested: window_size,
                });
            }

            let tz = self.time_zone();
            if let Some(from) = self.from {
                if !window_size.is_aligned(from, tz) {
                    return Err(QueryParamsError::UnalignedFrom(window_size));
                }
            }
            if let Some(to) = self.to {
                if !window_size.is_aligned(to, tz) {
                    return Err(QueryParamsError::UnalignedTo(window_size));
                }
            }
        }

        Ok(())
    }
}
