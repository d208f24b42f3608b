//! Query Route
//!
//! - GET /api/v1/meters/:id_or_slug/query - Query meter values
//!
//! The body is JSON unless the `Accept` header asks for `text/csv`.

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap},
};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::query_string::parse_query_string;
use crate::api::state::AppState;
use crate::render::{negotiate_format, RenderedResponse};

/// GET /api/v1/meters/:id_or_slug/query
///
/// Query a meter over a range, optionally windowed, grouped and filtered.
pub async fn query_meter(
    State(state): State<Arc<AppState>>,
    Path(id_or_slug): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> ApiResult<RenderedResponse> {
    let raw = parse_query_string(query.as_deref())?;

    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());
    let format = negotiate_format(accept);

    let rendered = state
        .service
        .query_meter(&state.namespace, &id_or_slug, &raw, format)
        .await?;

    Ok(rendered)
}
