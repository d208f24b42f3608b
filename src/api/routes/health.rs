//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (meter catalog readable)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Kubernetes readiness probe.
/// Returns 200 once the meter catalog answers for the served namespace.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match catalog_meter_count(&state).await {
        Some(_) => StatusCode::OK,
        None => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let meters = catalog_meter_count(&state).await;

    let (status, catalog) = match meters {
        Some(_) => ("healthy", "ok"),
        None => ("degraded", "error"),
    };

    Json(HealthResponse {
        status: status.to_string(),
        catalog: catalog.to_string(),
        namespace: state.namespace.clone(),
        meters: meters.unwrap_or(0),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Number of meters in the served namespace, `None` when the catalog fails
async fn catalog_meter_count(state: &AppState) -> Option<usize> {
    state
        .service
        .list_meters(&state.namespace)
        .await
        .map(|meters| meters.len())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
