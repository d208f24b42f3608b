//! CSV rendering
//!
//! Columns: `window_start, window_end, subject, <group-by keys>, value`.
//! Subject always has its own column, so it is left out of the group-by
//! columns even when requested as a group-by dimension.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::meter::{MeterQueryRow, SUBJECT_DIMENSION};

/// Header row for the requested group-by keys
pub fn csv_header(group_by_keys: &[String]) -> Vec<String> {
    let mut header = vec![
        "window_start".to_string(),
        "window_end".to_string(),
        SUBJECT_DIMENSION.to_string(),
    ];
    header.extend(dimension_columns(group_by_keys).map(str::to_string));
    header.push("value".to_string());
    header
}

/// One data record
pub fn csv_record(row: &MeterQueryRow, group_by_keys: &[String]) -> Vec<String> {
    let mut record = vec![
        format_timestamp(&row.window_start),
        format_timestamp(&row.window_end),
        row.subject.clone().unwrap_or_default(),
    ];
    for key in dimension_columns(group_by_keys) {
        let value = row.group_by.get(key).cloned().flatten().unwrap_or_default();
        record.push(value);
    }
    record.push(format_value(row.value));
    record
}

/// Render rows as CSV.
///
/// A write failure is logged and whatever was written so far is returned;
/// the caller has no way to turn a half-written body into an error.
pub fn render_csv(rows: &[MeterQueryRow], group_by_keys: &[String]) -> Vec<u8> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let records = std::iter::once(csv_header(group_by_keys))
        .chain(rows.iter().map(|row| csv_record(row, group_by_keys)));

    for record in records {
        if let Err(e) = writer.write_record(&record) {
            tracing::error!(error = %e, "Writing record to CSV failed");
            break;
        }
    }

    match writer.into_inner() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e.error(), "Flushing CSV failed");
            e.into_inner().get_ref().clone()
        }
    }
}

fn dimension_columns(group_by_keys: &[String]) -> impl Iterator<Item = &str> {
    group_by_keys
        .iter()
        .map(String::as_str)
        .filter(|k| *k != SUBJECT_DIMENSION)
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn format_value(value: f64) -> String {
    format!("{:.6}", value)
}
