//! Meter Catalog
//!
//! Lookup of meter definitions by id or slug. The query pipeline only reads
//! from the catalog; definitions are loaded once at startup.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::meter::error::{MeterError, MeterResult};
use crate::meter::types::Meter;

/// Catalog lookup failures
///
/// `NotFound` is kept distinct from `Lookup` so callers can answer 404
/// rather than 500.
#[derive(Error, Debug, Clone)]
pub enum CatalogError {
    /// No meter with this id or slug exists in the namespace
    #[error("meter not found: {id_or_slug}")]
    NotFound {
        namespace: String,
        id_or_slug: String,
    },

    /// The catalog could not be read
    #[error("meter lookup failed: {0}")]
    Lookup(String),
}

impl CatalogError {
    /// Whether this is a not-found miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Read access to meter definitions
#[async_trait]
pub trait MeterCatalog: Send + Sync {
    /// Resolve a meter by id or slug
    async fn get_meter_by_id_or_slug(
        &self,
        namespace: &str,
        id_or_slug: &str,
    ) -> Result<Meter, CatalogError>;

    /// List meters of a namespace, ordered by slug
    async fn list_meters(&self, namespace: &str) -> Result<Vec<Meter>, CatalogError>;
}

/// Catalog backed by definitions held in memory
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    meters: HashMap<String, Vec<Meter>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from definitions, placing meters without a namespace
    /// into `default_namespace`.
    pub fn from_meters(
        default_namespace: &str,
        meters: impl IntoIterator<Item = Meter>,
    ) -> MeterResult<Self> {
        let mut catalog = Self::new();
        for mut meter in meters {
            if meter.namespace.is_empty() {
                meter.namespace = default_namespace.to_string();
            }
            catalog.insert(meter)?;
        }
        Ok(catalog)
    }

    /// Validate and add a meter. A meter without an id gets a generated one.
    pub fn insert(&mut self, mut meter: Meter) -> MeterResult<()> {
        meter.validate()?;

        if meter.id.is_empty() {
            meter.id = uuid::Uuid::new_v4().to_string();
        }

        let meters = self.meters.entry(meter.namespace.clone()).or_default();
        if meters.iter().any(|m| m.slug == meter.slug) {
            return Err(MeterError::DuplicateSlug {
                namespace: meter.namespace,
                slug: meter.slug,
            });
        }

        tracing::debug!(namespace = %meter.namespace, meter = %meter.slug, "Registered meter");
        meters.push(meter);
        meters.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(())
    }

    /// Total number of meters across namespaces
    pub fn len(&self) -> usize {
        self.meters.values().map(Vec::len).sum()
    }

    /// Whether the catalog holds no meters
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MeterCatalog for InMemoryCatalog {
    async fn get_meter_by_id_or_slug(
        &self,
        namespace: &str,
        id_or_slug: &str,
    ) -> Result<Meter, CatalogError> {
        self.meters
            .get(namespace)
            .and_then(|meters| meters.iter().find(|m| m.is_addressed_by(id_or_slug)))
            .cloned()
            .ok_or_else(|| CatalogError::NotFound {
                namespace: namespace.to_string(),
                id_or_slug: id_or_slug.to_string(),
            })
    }

    async fn list_meters(&self, namespace: &str) -> Result<Vec<Meter>, CatalogError> {
        Ok(self.meters.get(namespace).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::types::MeterAggregation;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::from_meters(
            "default",
            vec![
                Meter::new("tokens", MeterAggregation::Sum, "prompt")
                    .id("m-tokens")
                    .value_property("$.tokens"),
                Meter::new("api_calls", MeterAggregation::Count, "request"),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_lookup_by_slug_and_id() {
        let catalog = catalog();
        let by_slug = catalog.get_meter_by_id_or_slug("default", "tokens").await.unwrap();
        let by_id = catalog.get_meter_by_id_or_slug("default", "m-tokens").await.unwrap();
        assert_eq!(by_slug, by_id);
        assert_eq!(by_slug.namespace, "default");
    }

    #[tokio::test]
    async fn test_lookup_miss_is_not_found() {
        let catalog = catalog();
        let err = catalog
            .get_meter_by_id_or_slug("default", "nope")
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = catalog
            .get_meter_by_id_or_slug("other", "tokens")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_generated_ids_and_ordering() {
        let catalog = catalog();
        let meters = catalog.list_meters("default").await.unwrap();
        assert_eq!(meters.len(), 2);
        assert_eq!(meters[0].slug, "api_calls");
        assert!(!meters[0].id.is_empty());
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_duplicate_slug_rejected() {
        let result = InMemoryCatalog::from_meters(
            "default",
            vec![
                Meter::new("calls", MeterAggregation::Count, "request"),
                Meter::new("calls", MeterAggregation::Count, "request"),
            ],
        );
        assert!(matches!(result, Err(MeterError::DuplicateSlug { .. })));
    }

    #[test]
    fn test_invalid_meter_rejected() {
        let result = InMemoryCatalog::from_meters(
            "default",
            vec![Meter::new("calls", MeterAggregation::Sum, "request")],
        );
        assert!(result.is_err());
    }
}
