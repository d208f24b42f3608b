//! Response Rendering
//!
//! Shapes backend rows into the bytes sent to the client:
//!
//! - **Media**: `Accept` header parsing and format negotiation
//! - **JSON**: `{windowSize, from, to, data}` documents
//! - **CSV**: flat `window_start,window_end,subject,...,value` tables
//!
//! Total-period queries (no window size) report every row as spanning the
//! requested range, whatever bounds the backend returned.

mod csv;
mod json;
mod media;

pub use self::csv::{csv_header, csv_record, render_csv};
pub use json::{render_json, QueryMeterResponse};
pub use media::{negotiate_format, parse_media_type, MediaType, MediaTypeError, ResponseFormat};

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::meter::MeterQueryRow;
use crate::query::RawQueryParams;

/// Rendering failures
#[derive(Error, Debug)]
pub enum RenderError {
    /// JSON serialization failed
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// A rendered body with its headers
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResponse {
    /// `Content-Type` header value
    pub content_type: &'static str,
    /// `Content-Disposition` header value, set for downloads
    pub content_disposition: Option<String>,
    /// Body bytes
    pub body: Vec<u8>,
}

impl IntoResponse for RenderedResponse {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::OK,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response();

        if let Some(disposition) = self.content_disposition {
            match disposition.parse() {
                Ok(value) => {
                    response
                        .headers_mut()
                        .insert(header::CONTENT_DISPOSITION, value);
                }
                Err(e) => tracing::warn!(error = %e, "Invalid Content-Disposition header"),
            }
        }

        response
    }
}

impl QueryMeterResponse {
    /// Response for `rows` answering `request`, total-period rewrite applied
    pub fn new(request: &RawQueryParams, mut rows: Vec<MeterQueryRow>) -> Self {
        if request.window_size.is_none() {
            apply_total_period(&mut rows, request);
        }

        Self {
            window_size: request.window_size,
            from: request.from,
            to: request.to,
            data: rows,
        }
    }
}

/// Overwrite row bounds with the requested range, bound by bound
pub fn apply_total_period(rows: &mut [MeterQueryRow], request: &RawQueryParams) {
    for row in rows.iter_mut() {
        if let Some(from) = request.from {
            row.window_start = from;
        }
        if let Some(to) = request.to {
            row.window_end = to;
        }
    }
}

/// Render a response in the negotiated format.
///
/// `group_by_keys` are the query's group-by dimensions and only shape the
/// CSV columns; `meter_slug` names the CSV download.
pub fn render(
    format: ResponseFormat,
    response: &QueryMeterResponse,
    group_by_keys: &[String],
    meter_slug: &str,
) -> Result<RenderedResponse, RenderError> {
    match format {
        ResponseFormat::Json => Ok(RenderedResponse {
            content_type: format.content_type(),
            content_disposition: None,
            body: render_json(response)?,
        }),
        ResponseFormat::Csv => Ok(RenderedResponse {
            content_type: format.content_type(),
            content_disposition: Some(format!("attachment; filename={}.csv", meter_slug)),
            body: render_csv(&response.data, group_by_keys),
        }),
    }
}
