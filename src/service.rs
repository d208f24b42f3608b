//! Meter Query Service
//!
//! Sequences one query request:
//!
//! ```text
//! resolve meter → build query → backend query → render
//! ```
//!
//! Each step either hands its output to the next one or ends the request
//! with a [`QueryMeterError`]. Server-side failures are reported to the
//! [`ErrorHandler`] before they are returned.

use axum::http::StatusCode;
use std::sync::Arc;
use thiserror::Error;

use crate::backend::{AggregationBackend, BackendError};
use crate::meter::{CatalogError, Meter, MeterCatalog};
use crate::query::{build_query, QueryError, RawQueryParams};
use crate::render::{render, QueryMeterResponse, RenderError, RenderedResponse, ResponseFormat};

/// Failures of a meter request
#[derive(Error, Debug)]
pub enum QueryMeterError {
    /// No meter matches the id or slug
    #[error("meter not found: {0}")]
    MeterNotFound(String),

    /// The catalog lookup itself failed
    #[error("failed to get meter: {0}")]
    MeterLookup(String),

    /// Request parameters are invalid for the meter
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The aggregation backend failed
    #[error("failed to query meter: {0}")]
    Backend(#[from] BackendError),

    /// The response could not be rendered
    #[error("failed to render response: {0}")]
    Render(#[from] RenderError),
}

impl QueryMeterError {
    /// HTTP status for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MeterNotFound(_) => StatusCode::NOT_FOUND,
            Self::Query(_) => StatusCode::BAD_REQUEST,
            Self::MeterLookup(_) | Self::Backend(_) | Self::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the failure is on the server side
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<CatalogError> for QueryMeterError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound { id_or_slug, .. } => Self::MeterNotFound(id_or_slug),
            CatalogError::Lookup(detail) => Self::MeterLookup(detail),
        }
    }
}

/// Operational sink for server-side failures
pub trait ErrorHandler: Send + Sync {
    /// Report a failure that is about to be returned to a client
    fn handle_error(&self, operation: &str, error: &QueryMeterError);
}

/// Reports failures as `tracing` error events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn handle_error(&self, operation: &str, error: &QueryMeterError) {
        tracing::error!(operation, error = %error, "Meter request failed");
    }
}

/// Serves meter definitions and meter queries
#[derive(Clone)]
pub struct QueryMeterService {
    catalog: Arc<dyn MeterCatalog>,
    backend: Arc<dyn AggregationBackend>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl QueryMeterService {
    /// Create a service reporting failures through `tracing`
    pub fn new(catalog: Arc<dyn MeterCatalog>, backend: Arc<dyn AggregationBackend>) -> Self {
        Self {
            catalog,
            backend,
            error_handler: Arc::new(TracingErrorHandler),
        }
    }

    /// Builder: set the error sink
    pub fn with_error_handler(mut self, error_handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = error_handler;
        self
    }

    /// Query a meter and render the result in `format`
    pub async fn query_meter(
        &self,
        namespace: &str,
        id_or_slug: &str,
        raw: &RawQueryParams,
        format: ResponseFormat,
    ) -> Result<RenderedResponse, QueryMeterError> {
        let result = self.run_query(namespace, id_or_slug, raw, format).await;
        self.report("query_meter", result)
    }

    /// List the meters of a namespace
    pub async fn list_meters(&self, namespace: &str) -> Result<Vec<Meter>, QueryMeterError> {
        let result = self
            .catalog
            .list_meters(namespace)
            .await
            .map_err(QueryMeterError::from);
        self.report("list_meters", result)
    }

    /// Resolve one meter
    pub async fn get_meter(
        &self,
        namespace: &str,
        id_or_slug: &str,
    ) -> Result<Meter, QueryMeterError> {
        let result = self.resolve_meter(namespace, id_or_slug).await;
        self.report("get_meter", result)
    }

    /// List the subjects that have values for a meter
    pub async fn list_subjects(
        &self,
        namespace: &str,
        id_or_slug: &str,
    ) -> Result<Vec<String>, QueryMeterError> {
        let result = async {
            let meter = self.resolve_meter(namespace, id_or_slug).await?;
            let subjects = self
                .backend
                .list_meter_subjects(namespace, &meter.slug)
                .await?;
            Ok::<_, QueryMeterError>(subjects)
        }
        .await;
        self.report("list_subjects", result)
    }

    async fn run_query(
        &self,
        namespace: &str,
        id_or_slug: &str,
        raw: &RawQueryParams,
        format: ResponseFormat,
    ) -> Result<RenderedResponse, QueryMeterError> {
        let meter = self.resolve_meter(namespace, id_or_slug).await?;
        let params = build_query(&meter, raw)?;

        let rows = self
            .backend
            .query_meter(namespace, &meter.slug, &params)
            .await?;

        tracing::debug!(
            namespace,
            meter = %meter.slug,
            rows = rows.len(),
            format = ?format,
            "Meter query executed"
        );

        let response = QueryMeterResponse::new(raw, rows);
        Ok(render(format, &response, &params.group_by, &meter.slug)?)
    }

    async fn resolve_meter(
        &self,
        namespace: &str,
        id_or_slug: &str,
    ) -> Result<Meter, QueryMeterError> {
        Ok(self
            .catalog
            .get_meter_by_id_or_slug(namespace, id_or_slug)
            .await?)
    }

    fn report<T>(
        &self,
        operation: &str,
        result: Result<T, QueryMeterError>,
    ) -> Result<T, QueryMeterError> {
        if let Err(e) = &result {
            if e.is_server_error() {
                self.error_handler.handle_error(operation, e);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendResult, InMemoryBackend};
    use crate::meter::{InMemoryCatalog, MeterAggregation, MeterQueryRow, WindowSize};
    use crate::query::QueryParams;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[derive(Default)]
    struct RecordingErrorHandler {
        reported: Mutex<Vec<String>>,
    }

    impl ErrorHandler for RecordingErrorHandler {
        fn handle_error(&self, operation: &str, error: &QueryMeterError) {
            self.reported
                .lock()
                .unwrap()
                .push(format!("{}: {}", operation, error));
        }
    }

    struct FailingCatalog;

    #[async_trait]
    impl MeterCatalog for FailingCatalog {
        async fn get_meter_by_id_or_slug(&self, _: &str, _: &str) -> Result<Meter, CatalogError> {
            Err(CatalogError::Lookup("connection reset".to_string()))
        }

        async fn list_meters(&self, _: &str) -> Result<Vec<Meter>, CatalogError> {
            Err(CatalogError::Lookup("connection reset".to_string()))
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl AggregationBackend for FailingBackend {
        async fn query_meter(
            &self,
            _: &str,
            _: &str,
            _: &QueryParams,
        ) -> BackendResult<Vec<MeterQueryRow>> {
            Err(BackendError::Unavailable("clickhouse down".to_string()))
        }

        async fn list_meter_subjects(&self, _: &str, _: &str) -> BackendResult<Vec<String>> {
            Err(BackendError::Unavailable("clickhouse down".to_string()))
        }
    }

    fn catalog() -> Arc<dyn MeterCatalog> {
        let meter = Meter::new("api_calls", MeterAggregation::Count, "request")
            .id("m-1")
            .window_size(WindowSize::Hour)
            .group_by("region", "$.region");
        Arc::new(InMemoryCatalog::from_meters("default", [meter]).unwrap())
    }

    async fn backend() -> Arc<dyn AggregationBackend> {
        let backend = InMemoryBackend::new();
        backend
            .insert_rows(
                "default",
                "api_calls",
                vec![
                    MeterQueryRow::new(utc("2024-01-01T00:00:00Z"), utc("2024-01-01T01:00:00Z"), 3.0)
                        .subject("acme")
                        .group("region", "eu"),
                ],
            )
            .await;
        Arc::new(backend)
    }

    fn service_with(
        catalog: Arc<dyn MeterCatalog>,
        backend: Arc<dyn AggregationBackend>,
    ) -> (QueryMeterService, Arc<RecordingErrorHandler>) {
        let handler = Arc::new(RecordingErrorHandler::default());
        let service = QueryMeterService::new(catalog, backend).with_error_handler(handler.clone());
        (service, handler)
    }

    #[tokio::test]
    async fn test_query_json() {
        let (service, handler) = service_with(catalog(), backend().await);
        let rendered = service
            .query_meter("default", "api_calls", &RawQueryParams::new(), ResponseFormat::Json)
            .await
            .unwrap();

        let body: serde_json::Value = serde_json::from_slice(&rendered.body).unwrap();
        assert_eq!(body["data"][0]["value"], 3.0);
        assert!(handler.reported.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_by_id() {
        let (service, _) = service_with(catalog(), backend().await);
        let rendered = service
            .query_meter("default", "m-1", &RawQueryParams::new(), ResponseFormat::Csv)
            .await
            .unwrap();
        assert_eq!(
            rendered.content_disposition.as_deref(),
            Some("attachment; filename=api_calls.csv")
        );
    }

    #[tokio::test]
    async fn test_meter_not_found_is_404() {
        let (service, handler) = service_with(catalog(), backend().await);
        let err = service
            .query_meter("default", "missing", &RawQueryParams::new(), ResponseFormat::Json)
            .await
            .unwrap_err();

        assert!(matches!(err, QueryMeterError::MeterNotFound(_)));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(handler.reported.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_is_400_and_stops_pipeline() {
        let (service, handler) = service_with(catalog(), Arc::new(FailingBackend));
        let raw = RawQueryParams::new().group_by("model");
        let err = service
            .query_meter("default", "api_calls", &raw, ResponseFormat::Json)
            .await
            .unwrap_err();

        // The failing backend is never reached
        assert!(matches!(err, QueryMeterError::Query(QueryError::InvalidGroupBy(_))));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(handler.reported.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_is_reported() {
        let (service, handler) = service_with(catalog(), Arc::new(FailingBackend));
        let err = service
            .query_meter("default", "api_calls", &RawQueryParams::new(), ResponseFormat::Json)
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let reported = handler.reported.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].starts_with("query_meter: failed to query meter"));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_reported() {
        let (service, handler) = service_with(Arc::new(FailingCatalog), backend().await);
        let err = service.get_meter("default", "api_calls").await.unwrap_err();

        assert!(matches!(err, QueryMeterError::MeterLookup(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(handler.reported.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_subjects() {
        let (service, _) = service_with(catalog(), backend().await);
        let subjects = service.list_subjects("default", "m-1").await.unwrap();
        assert_eq!(subjects, vec!["acme"]);
    }

    #[tokio::test]
    async fn test_list_meters() {
        let (service, _) = service_with(catalog(), backend().await);
        let meters = service.list_meters("default").await.unwrap();
        assert_eq!(meters.len(), 1);
        assert!(service.list_meters("other").await.unwrap().is_empty());
    }
}
