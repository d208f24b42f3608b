//! Core meter types
//!
//! - `Meter`: schema-bearing definition of how events are aggregated
//! - `MeterAggregation` and `WindowSize`: classification enums
//! - `MeterQueryRow`: one pre-aggregated value returned by a backend

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meter::error::{MeterError, MeterResult};

/// The implicit dimension every meter can be grouped and filtered by.
pub const SUBJECT_DIMENSION: &str = "subject";

/// How a meter aggregates event values inside a window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeterAggregation {
    /// Sum of the value property
    Sum,
    /// Number of events
    Count,
    /// Average of the value property
    Avg,
    /// Minimum of the value property
    Min,
    /// Maximum of the value property
    Max,
    /// Number of distinct values of the value property
    UniqueCount,
}

impl MeterAggregation {
    /// Whether this aggregation reads a value out of the event payload
    pub fn requires_value_property(&self) -> bool {
        !matches!(self, Self::Count)
    }
}

impl std::fmt::Display for MeterAggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sum => write!(f, "SUM"),
            Self::Count => write!(f, "COUNT"),
            Self::Avg => write!(f, "AVG"),
            Self::Min => write!(f, "MIN"),
            Self::Max => write!(f, "MAX"),
            Self::UniqueCount => write!(f, "UNIQUE_COUNT"),
        }
    }
}

/// Window granularity, ordered from finest to coarsest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowSize {
    /// One-minute windows
    #[default]
    Minute,
    /// One-hour windows
    Hour,
    /// Calendar-day windows
    Day,
    /// Calendar-month windows
    Month,
}

impl WindowSize {
    /// All window sizes, finest first
    pub fn all() -> &'static [WindowSize] {
        &[
            WindowSize::Minute,
            WindowSize::Hour,
            WindowSize::Day,
            WindowSize::Month,
        ]
    }

    /// Truncate an instant to the start of its window in the given time zone.
    ///
    /// When the truncated local time occurs twice (DST fold), the later
    /// occurrence that is not after `instant` is the window start. When it
    /// does not occur at all (DST gap), the window starts at the first
    /// instant after the gap.
    pub fn truncate(&self, instant: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
        let local = instant.with_timezone(&tz).naive_local();

        let truncated: Option<NaiveDateTime> = match self {
            Self::Minute => local.with_second(0).and_then(|d| d.with_nanosecond(0)),
            Self::Hour => local
                .with_minute(0)
                .and_then(|d| d.with_second(0))
                .and_then(|d| d.with_nanosecond(0)),
            Self::Day => local.date().and_hms_opt(0, 0, 0),
            Self::Month => local
                .date()
                .with_day(1)
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
        };

        truncated
            .and_then(|naive| resolve_local(naive, instant, tz))
            .unwrap_or(instant)
    }

    /// Whether the instant sits exactly on a window boundary in `tz`
    pub fn is_aligned(&self, instant: DateTime<Utc>, tz: Tz) -> bool {
        self.truncate(instant, tz) == instant
    }
}

/// Longest DST gap searched when a local window start does not exist
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Map a truncated local time back to UTC.
fn resolve_local(naive: NaiveDateTime, instant: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let candidates = tz.from_local_datetime(&naive);

    if let Some(earliest) = candidates.earliest() {
        let earliest = earliest.with_timezone(&Utc);
        let latest = candidates
            .latest()
            .map(|dt| dt.with_timezone(&Utc))
            .filter(|dt| *dt <= instant);
        return Some(latest.unwrap_or(earliest));
    }

    // Skipped local time: the first local minute that exists again is the
    // instant the clocks jumped
    (1..=MAX_GAP_MINUTES)
        .map(|m| naive + Duration::minutes(m))
        .find_map(|n| tz.from_local_datetime(&n).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

impl std::str::FromStr for WindowSize {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MINUTE" => Ok(Self::Minute),
            "HOUR" => Ok(Self::Hour),
            "DAY" => Ok(Self::Day),
            "MONTH" => Ok(Self::Month),
            _ => Err(MeterError::UnknownWindowSize(s.to_string())),
        }
    }
}

impl std::fmt::Display for WindowSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minute => write!(f, "MINUTE"),
            Self::Hour => write!(f, "HOUR"),
            Self::Day => write!(f, "DAY"),
            Self::Month => write!(f, "MONTH"),
        }
    }
}

/// Definition of a meter
///
/// `group_by` maps a declared dimension name to the JSON path its value is
/// extracted from. Its keys are the only dimensions a query may group or
/// filter by, besides [`SUBJECT_DIMENSION`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meter {
    /// Unique identifier, generated when not configured
    #[serde(default)]
    pub id: String,
    /// URL-safe unique name
    pub slug: String,
    /// Namespace the meter belongs to
    #[serde(default)]
    pub namespace: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// How values are aggregated
    pub aggregation: MeterAggregation,
    /// Finest window the meter is aggregated at
    #[serde(default)]
    pub window_size: WindowSize,
    /// Event type the meter consumes
    pub event_type: String,
    /// JSON path of the aggregated value in the event payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_property: Option<String>,
    /// Declared group-by dimensions and their extraction paths
    #[serde(default)]
    pub group_by: BTreeMap<String, String>,
}

impl Meter {
    /// Create a meter with required fields
    pub fn new(
        slug: impl Into<String>,
        aggregation: MeterAggregation,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            slug: slug.into(),
            namespace: String::new(),
            description: None,
            aggregation,
            window_size: WindowSize::default(),
            event_type: event_type.into(),
            value_property: None,
            group_by: BTreeMap::new(),
        }
    }

    /// Builder: set id
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Builder: set description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Builder: set window size
    pub fn window_size(mut self, window_size: WindowSize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Builder: set value property
    pub fn value_property(mut self, path: impl Into<String>) -> Self {
        self.value_property = Some(path.into());
        self
    }

    /// Builder: declare a group-by dimension
    pub fn group_by(mut self, key: impl Into<String>, path: impl Into<String>) -> Self {
        self.group_by.insert(key.into(), path.into());
        self
    }

    /// Whether `key` is a declared group-by dimension with a non-empty path
    pub fn declares_group_by(&self, key: &str) -> bool {
        self.group_by.get(key).is_some_and(|path| !path.is_empty())
    }

    /// Whether this meter is addressed by `id_or_slug`
    pub fn is_addressed_by(&self, id_or_slug: &str) -> bool {
        self.slug == id_or_slug || (!self.id.is_empty() && self.id == id_or_slug)
    }

    /// Check the definition is internally consistent
    pub fn validate(&self) -> MeterResult<()> {
        let slug_ok = !self.slug.is_empty()
            && self
                .slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !slug_ok {
            return Err(MeterError::InvalidSlug(self.slug.clone()));
        }

        if self.event_type.trim().is_empty() {
            return Err(MeterError::EmptyEventType(self.slug.clone()));
        }

        match (&self.value_property, self.aggregation.requires_value_property()) {
            (None, true) => {
                return Err(MeterError::MissingValueProperty {
                    slug: self.slug.clone(),
                    aggregation: self.aggregation,
                })
            }
            (Some(_), false) => {
                return Err(MeterError::UnexpectedValueProperty(self.slug.clone()))
            }
            _ => {}
        }

        for (key, path) in &self.group_by {
            if key.is_empty() || key == SUBJECT_DIMENSION {
                return Err(MeterError::InvalidGroupByKey {
                    slug: self.slug.clone(),
                    key: key.clone(),
                });
            }
            if path.trim().is_empty() {
                return Err(MeterError::EmptyGroupByPath {
                    slug: self.slug.clone(),
                    key: key.clone(),
                });
            }
        }

        Ok(())
    }
}

/// A pre-aggregated meter value for one window and group-by combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterQueryRow {
    /// Window start (inclusive)
    pub window_start: DateTime<Utc>,
    /// Window end (exclusive)
    pub window_end: DateTime<Utc>,
    /// Subject, present when grouped by subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Values of the requested group-by dimensions
    #[serde(default)]
    pub group_by: BTreeMap<String, Option<String>>,
    /// Aggregated value
    pub value: f64,
}

impl MeterQueryRow {
    /// Create a row for a window
    pub fn new(window_start: DateTime<Utc>, window_end: DateTime<Utc>, value: f64) -> Self {
        Self {
            window_start,
            window_end,
            subject: None,
            group_by: BTreeMap::new(),
            value,
        }
    }

    /// Builder: set subject
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Builder: set a group-by value
    pub fn group(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.group_by.insert(key.into(), Some(value.into()));
        self
    }
}
