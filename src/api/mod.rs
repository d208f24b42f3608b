//! Meterscope REST API
//!
//! HTTP API layer for meter queries, built with Axum.
//!
//! # Endpoints
//!
//! ## Meters
//! - `GET /api/v1/meters` - List meters
//! - `GET /api/v1/meters/:id_or_slug` - Get a meter
//! - `GET /api/v1/meters/:id_or_slug/subjects` - List subjects
//! - `GET /api/v1/meters/:id_or_slug/query` - Query meter values (JSON or CSV)
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! Failures are answered with `application/problem+json` bodies.
//!
//! # Example
//!
//! ```rust,ignore
//! use meterscope::api::{serve, ApiConfig, AppState};
//! use meterscope::backend::InMemoryBackend;
//! use meterscope::meter::InMemoryCatalog;
//! use meterscope::service::QueryMeterService;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = QueryMeterService::new(
//!         Arc::new(InMemoryCatalog::new()),
//!         Arc::new(InMemoryBackend::new()),
//!     );
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(service, "default", config.clone());
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod query_string;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult, ProblemDetails};
pub use state::{ApiConfig, AppState};

use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/meters", get(routes::meters::list_meters))
        .route("/meters/:id_or_slug", get(routes::meters::get_meter))
        .route(
            "/meters/:id_or_slug/subjects",
            get(routes::meters::list_subjects),
        )
        .route("/meters/:id_or_slug/query", get(routes::query::query_meter));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config.cors_origins);
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// CORS for the configured origins; any origin when none are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET])
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let namespace = state.namespace.clone();
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(namespace = %namespace, "Meterscope API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Meterscope API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::meter::{InMemoryCatalog, Meter, MeterAggregation, MeterQueryRow, WindowSize};
    use crate::service::QueryMeterService;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use chrono::{DateTime, Utc};
    use tower::util::ServiceExt;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    async fn create_test_app() -> Router {
        let meter = Meter::new("api_calls", MeterAggregation::Count, "request")
            .id("01HQ-api-calls")
            .window_size(WindowSize::Hour)
            .group_by("region", "$.region");
        let catalog = InMemoryCatalog::from_meters("default", [meter]).unwrap();

        let backend = InMemoryBackend::new();
        backend
            .insert_rows(
                "default",
                "api_calls",
                vec![
                    MeterQueryRow::new(utc("2024-01-01T00:00:00Z"), utc("2024-01-01T01:00:00Z"), 7.0)
                        .subject("acme")
                        .group("region", "eu"),
                    MeterQueryRow::new(utc("2024-01-01T05:00:00Z"), utc("2024-01-01T06:00:00Z"), 3.0)
                        .subject("globex")
                        .group("region", "us"),
                ],
            )
            .await;

        let service = QueryMeterService::new(Arc::new(catalog), Arc::new(backend));
        build_router(AppState::new(service, "default", ApiConfig::default()))
    }

    async fn send_get(app: Router, uri: &str, accept: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }
        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let response = send_get(create_test_app().await, "/health/live", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let response = send_get(create_test_app().await, "/health/ready", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let response = send_get(create_test_app().await, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["meters"], 1);
    }

    #[tokio::test]
    async fn test_list_meters() {
        let response = send_get(create_test_app().await, "/api/v1/meters", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["meters"][0]["slug"], "api_calls");
    }

    #[tokio::test]
    async fn test_get_meter_by_id() {
        let response = send_get(create_test_app().await, "/api/v1/meters/01HQ-api-calls", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["slug"], "api_calls");
    }

    #[tokio::test]
    async fn test_get_meter_not_found() {
        let response = send_get(create_test_app().await, "/api/v1/meters/nope", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );

        let body = body_json(response).await;
        assert_eq!(body["status"], 404);
        assert_eq!(body["title"], "Not Found");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_list_subjects() {
        let response = send_get(create_test_app().await, "/api/v1/meters/api_calls/subjects", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["subjects"], serde_json::json!(["acme", "globex"]));
    }

    #[tokio::test]
    async fn test_query_json_default() {
        let response = send_get(
            create_test_app().await,
            "/api/v1/meters/api_calls/query?windowSize=HOUR",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body = body_json(response).await;
        assert_eq!(body["windowSize"], "HOUR");
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"][1]["windowStart"], "2024-01-01T05:00:00Z");
    }

    #[tokio::test]
    async fn test_query_unparsable_accept_is_json() {
        let response = send_get(
            create_test_app().await,
            "/api/v1/meters/api_calls/query",
            Some("definitely not/a;media type"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_query_total_period_csv() {
        let response = send_get(
            create_test_app().await,
            "/api/v1/meters/api_calls/query?from=2024-01-01T00:00:00Z&to=2024-01-02T00:00:00Z\
             &groupBy=region&groupBy=subject",
            Some("text/csv"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=api_calls.csv"
        );

        assert_eq!(
            body_string(response).await,
            "window_start,window_end,subject,region,value\n\
             2024-01-01T00:00:00Z,2024-01-02T00:00:00Z,acme,eu,7.000000\n\
             2024-01-01T00:00:00Z,2024-01-02T00:00:00Z,globex,us,3.000000\n"
        );
    }

    #[tokio::test]
    async fn test_query_subject_filter() {
        let response = send_get(
            create_test_app().await,
            "/api/v1/meters/api_calls/query?subject=acme",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["subject"], "acme");
    }

    #[tokio::test]
    async fn test_query_validation_errors() {
        let cases = [
            "groupBy=model",
            "filter%5Bmodel%5D=%22x%22",
            "filter%5Bregion%5D=%7Bnope",
            "windowSize=MINUTE",
            "windowTimeZone=Mars/Olympus",
            "from=2024-01-02T00:00:00Z&to=2024-01-01T00:00:00Z",
            "from=2024-01-01T00:30:00Z&windowSize=HOUR",
            "from=not-a-time",
            "windowSize=FORTNIGHT",
        ];

        for case in cases {
            let uri = format!("/api/v1/meters/api_calls/query?{}", case);
            let response = send_get(create_test_app().await, &uri, None).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", case);

            let body = body_json(response).await;
            assert_eq!(body["status"], 400, "{}", case);
        }
    }

    #[tokio::test]
    async fn test_query_meter_not_found() {
        let response = send_get(create_test_app().await, "/api/v1/meters/nope/query", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
