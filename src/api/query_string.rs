//! Query-string decoding for meter queries
//!
//! ```text
//! from=<rfc3339>&to=<rfc3339>&windowSize=HOUR&windowTimeZone=Europe/Berlin
//!     &groupBy=region&groupBy=subject&subject=acme&filter[region]={"$ne":"test"}
//! ```
//!
//! Keys and values are percent-decoded with `+` read as a space. Unknown
//! keys are ignored; empty `from`, `to` and `windowSize` values count as
//! absent.

use chrono::{DateTime, Utc};
use std::borrow::Cow;

use crate::api::error::{ApiError, ApiResult};
use crate::meter::WindowSize;
use crate::query::RawQueryParams;

/// Decode a raw query string into request parameters
pub fn parse_query_string(query: Option<&str>) -> ApiResult<RawQueryParams> {
    let mut raw = RawQueryParams::new();

    let Some(query) = query else {
        return Ok(raw);
    };

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key)?;
        let value = decode(value)?;

        match key.as_ref() {
            "from" => raw.from = parse_instant("from", &value)?,
            "to" => raw.to = parse_instant("to", &value)?,
            "windowSize" => raw.window_size = parse_window_size(&value)?,
            "windowTimeZone" => raw.window_time_zone = Some(value.into_owned()),
            "groupBy" => raw.group_by.push(value.into_owned()),
            "subject" => raw.subject.push(value.into_owned()),
            other => match filter_key(other) {
                Some(dimension) => {
                    raw.filter.insert(dimension.to_string(), value.into_owned());
                }
                None => tracing::trace!(key = other, "Ignoring unknown query parameter"),
            },
        }
    }

    Ok(raw)
}

/// Dimension named by a `filter[<key>]` parameter
fn filter_key(key: &str) -> Option<&str> {
    key.strip_prefix("filter[")
        .and_then(|rest| rest.strip_suffix(']'))
        .filter(|dimension| !dimension.is_empty())
}

fn decode(component: &str) -> ApiResult<Cow<'_, str>> {
    let result = if component.contains('+') {
        urlencoding::decode(&component.replace('+', " ")).map(|s| Cow::Owned(s.into_owned()))
    } else {
        urlencoding::decode(component)
    };
    result.map_err(|e| ApiError::BadRequest(format!("invalid query string encoding: {}", e)))
}

fn parse_instant(name: &str, value: &str) -> ApiResult<Option<DateTime<Utc>>> {
    if value.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|e| ApiError::BadRequest(format!("invalid {}: '{}': {}", name, value, e)))
}

fn parse_window_size(value: &str) -> ApiResult<Option<WindowSize>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|e| ApiError::BadRequest(format!("invalid windowSize: {}", e)))
}
