//! Query Builder
//!
//! Turns request parameters into a [`QueryParams`] for a resolved meter.
//!
//! # Pipeline
//!
//! ```text
//! group by → subject → time zone → filters → range/window validation
//! ```
//!
//! The first failing step wins; nothing past it runs.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

use crate::filter::{parse_filter, validate_filter, Filter};
use crate::meter::{Meter, WindowSize, SUBJECT_DIMENSION};
use crate::query::error::{QueryError, QueryResult};
use crate::query::params::QueryParams;

/// Request parameters as received, before validation against a meter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQueryParams {
    /// Range start
    pub from: Option<DateTime<Utc>>,
    /// Range end
    pub to: Option<DateTime<Utc>>,
    /// Requested window size
    pub window_size: Option<WindowSize>,
    /// IANA zone name for window alignment
    pub window_time_zone: Option<String>,
    /// Requested group-by dimensions
    pub group_by: Vec<String>,
    /// Subjects to restrict (and group) the query to
    pub subject: Vec<String>,
    /// Filter text per dimension
    pub filter: BTreeMap<String, String>,
}

impl RawQueryParams {
    /// Empty parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the range start
    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the range end
    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Set the window size
    pub fn window_size(mut self, window_size: WindowSize) -> Self {
        self.window_size = Some(window_size);
        self
    }

    /// Set the window time zone
    pub fn window_time_zone(mut self, tz: impl Into<String>) -> Self {
        self.window_time_zone = Some(tz.into());
        self
    }

    /// Add a group-by dimension
    pub fn group_by(mut self, key: impl Into<String>) -> Self {
        self.group_by.push(key.into());
        self
    }

    /// Add a subject
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject.push(subject.into());
        self
    }

    /// Set the filter text for a dimension
    pub fn filter(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.filter.insert(key.into(), text.into());
        self
    }
}

/// Builds validated query parameters for one meter
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    meter: &'a Meter,
}

impl<'a> QueryBuilder<'a> {
    /// Create a builder for a resolved meter
    pub fn new(meter: &'a Meter) -> Self {
        Self { meter }
    }

    /// Validate `raw` against the meter and build the query
    pub fn build(&self, raw: &RawQueryParams) -> QueryResult<QueryParams> {
        let mut params = QueryParams::new(self.meter.aggregation);
        params.from = raw.from;
        params.to = raw.to;
        params.window_size = raw.window_size;

        params.group_by = self.resolve_group_by(&raw.group_by)?;
        apply_subjects(&mut params, &raw.subject);
        params.window_time_zone = resolve_time_zone(raw.window_time_zone.as_deref())?;
        self.apply_filters(&mut params, &raw.filter)?;

        params.validate(self.meter.window_size)?;

        tracing::debug!(
            meter = %self.meter.slug,
            group_by = ?params.group_by,
            window_size = ?params.window_size,
            "Built meter query"
        );

        Ok(params)
    }

    /// Check every requested key is `subject` or declared on the meter.
    /// Repeated keys are kept once.
    fn resolve_group_by(&self, requested: &[String]) -> QueryResult<Vec<String>> {
        let mut group_by: Vec<String> = Vec::with_capacity(requested.len());
        for key in requested {
            if key != SUBJECT_DIMENSION && !self.meter.declares_group_by(key) {
                return Err(QueryError::InvalidGroupBy(key.clone()));
            }
            if !group_by.contains(key) {
                group_by.push(key.clone());
            }
        }
        Ok(group_by)
    }

    /// Parse and validate each filter, routing `subject` to the subject
    /// filter and declared keys to the group-by filters.
    fn apply_filters(
        &self,
        params: &mut QueryParams,
        filters: &BTreeMap<String, String>,
    ) -> QueryResult<()> {
        for (key, text) in filters {
            let filter = parse_filter(text).map_err(|source| QueryError::InvalidFilterSyntax {
                key: key.clone(),
                filter: text.clone(),
                source,
            })?;

            validate_filter(&filter).map_err(|source| QueryError::InvalidFilter {
                key: key.clone(),
                filter: text.clone(),
                source,
            })?;

            if key == SUBJECT_DIMENSION {
                // Replaces any filter derived from subject values
                params.filter_subject = Some(filter);
            } else if self.meter.group_by.contains_key(key) {
                params.filter_group_by.insert(key.clone(), filter);
            } else {
                return Err(QueryError::InvalidGroupByFilter(key.clone()));
            }
        }
        Ok(())
    }
}

/// Build a query for `meter` from `raw`
pub fn build_query(meter: &Meter, raw: &RawQueryParams) -> QueryResult<QueryParams> {
    QueryBuilder::new(meter).build(raw)
}

/// Restrict the query to `subjects` and group by subject.
///
/// Subject-filtered results must stay attributable per subject, so the
/// subject dimension is appended to the group-by list when missing.
pub fn apply_subjects(params: &mut QueryParams, subjects: &[String]) {
    if subjects.is_empty() {
        return;
    }

    params.filter_subject = Some(Filter::one_of(subjects.iter().cloned()));

    if !params.groups_by(SUBJECT_DIMENSION) {
        params.group_by.push(SUBJECT_DIMENSION.to_string());
    }
}

/// Resolve a zone name against the zone database. An empty name is UTC.
pub fn resolve_time_zone(name: Option<&str>) -> QueryResult<Option<Tz>> {
    match name {
        None => Ok(None),
        Some("") => Ok(Some(Tz::UTC)),
        Some(name) => name
            .parse::<Tz>()
            .map(Some)
            .map_err(|_| QueryError::InvalidTimeZone(name.to_string())),
    }
}
