//! Meter Routes
//!
//! Read-only access to meter definitions.
//!
//! - GET /api/v1/meters - List meters
//! - GET /api/v1/meters/:id_or_slug - Get a meter
//! - GET /api/v1/meters/:id_or_slug/subjects - List subjects with values

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{MeterListResponse, SubjectListResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::meter::Meter;

/// GET /api/v1/meters
///
/// List the meters of the served namespace.
pub async fn list_meters(State(state): State<Arc<AppState>>) -> ApiResult<Json<MeterListResponse>> {
    let meters = state.service.list_meters(&state.namespace).await?;

    Ok(Json(MeterListResponse {
        total: meters.len(),
        meters,
    }))
}

/// GET /api/v1/meters/:id_or_slug
///
/// Get a meter by id or slug.
pub async fn get_meter(
    State(state): State<Arc<AppState>>,
    Path(id_or_slug): Path<String>,
) -> ApiResult<Json<Meter>> {
    let meter = state.service.get_meter(&state.namespace, &id_or_slug).await?;
    Ok(Json(meter))
}

/// GET /api/v1/meters/:id_or_slug/subjects
///
/// List the subjects that have values for a meter.
pub async fn list_subjects(
    State(state): State<Arc<AppState>>,
    Path(id_or_slug): Path<String>,
) -> ApiResult<Json<SubjectListResponse>> {
    let subjects = state
        .service
        .list_subjects(&state.namespace, &id_or_slug)
        .await?;

    Ok(Json(SubjectListResponse {
        meter: id_or_slug,
        subjects,
    }))
}
