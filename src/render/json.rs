//! JSON rendering

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::meter::{MeterQueryRow, WindowSize};

/// Body of a JSON meter query response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMeterResponse {
    /// Requested window size, `null` for a total-period query
    pub window_size: Option<WindowSize>,
    /// Requested range start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    /// Requested range end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    /// Result rows
    pub data: Vec<MeterQueryRow>,
}

/// Serialize a response document
pub fn render_json(response: &QueryMeterResponse) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(response)
}
