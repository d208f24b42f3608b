//! In-memory backend
//!
//! Serves pre-aggregated rows loaded up front. Queries select the rows that
//! fall inside the range and satisfy the subject and group-by filters; no
//! re-aggregation happens here.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tokio::sync::RwLock;

use crate::backend::{AggregationBackend, BackendError, BackendResult};
use crate::filter::{CompiledFilter, Filter};
use crate::meter::MeterQueryRow;
use crate::query::QueryParams;

/// Rows of one meter as stored in a fixture file
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureSet {
    /// Namespace, the default namespace when absent
    #[serde(default)]
    pub namespace: Option<String>,
    /// Meter slug
    pub meter: String,
    /// Pre-aggregated rows
    pub rows: Vec<MeterQueryRow>,
}

type MeterKey = (String, String);

/// Backend holding rows in memory
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    rows: RwLock<HashMap<MeterKey, Vec<MeterQueryRow>>>,
}

impl InMemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Load fixture sets from a JSON file
    pub async fn from_fixture_file(path: &Path, default_namespace: &str) -> BackendResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let sets: Vec<FixtureSet> = serde_json::from_str(&content)
            .map_err(|e| BackendError::Fixture(format!("{}: {}", path.display(), e)))?;

        let backend = Self::new();
        let mut total = 0;
        for set in sets {
            let namespace = set.namespace.unwrap_or_else(|| default_namespace.to_string());
            total += set.rows.len();
            backend.insert_rows(&namespace, &set.meter, set.rows).await;
        }

        tracing::info!(path = %path.display(), rows = total, "Loaded backend fixtures");
        Ok(backend)
    }

    /// Append rows for a meter
    pub async fn insert_rows(
        &self,
        namespace: &str,
        meter_slug: &str,
        rows: impl IntoIterator<Item = MeterQueryRow>,
    ) {
        let mut guard = self.rows.write().await;
        guard
            .entry((namespace.to_string(), meter_slug.to_string()))
            .or_default()
            .extend(rows);
    }

    /// Number of rows stored for a meter
    pub async fn row_count(&self, namespace: &str, meter_slug: &str) -> usize {
        let guard = self.rows.read().await;
        guard
            .get(&(namespace.to_string(), meter_slug.to_string()))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Row predicate for one query, with the filters compiled once
struct RowSelector<'a> {
    params: &'a QueryParams,
    subject: Option<CompiledFilter<'a>>,
    group_by: Vec<(&'a str, CompiledFilter<'a>)>,
}

impl<'a> RowSelector<'a> {
    fn new(params: &'a QueryParams) -> Self {
        Self {
            params,
            subject: params.filter_subject.as_ref().map(Filter::compile),
            group_by: params
                .filter_group_by
                .iter()
                .map(|(key, filter)| (key.as_str(), filter.compile()))
                .collect(),
        }
    }

    /// Whether a stored row is selected by the query
    fn selects(&self, row: &MeterQueryRow) -> bool {
        if self.params.from.is_some_and(|from| row.window_start < from) {
            return false;
        }
        if self.params.to.is_some_and(|to| row.window_end > to) {
            return false;
        }
        if let Some(filter) = &self.subject {
            if !filter.matches(row.subject.as_deref()) {
                return false;
            }
        }
        self.group_by.iter().all(|(key, filter)| {
            let value = row.group_by.get(*key).and_then(|v| v.as_deref());
            filter.matches(value)
        })
    }
}

#[async_trait]
impl AggregationBackend for InMemoryBackend {
    async fn query_meter(
        &self,
        namespace: &str,
        meter_slug: &str,
        params: &QueryParams,
    ) -> BackendResult<Vec<MeterQueryRow>> {
        let selector = RowSelector::new(params);
        let guard = self.rows.read().await;
        let rows = guard
            .get(&(namespace.to_string(), meter_slug.to_string()))
            .map(|rows| {
                rows.iter()
                    .filter(|row| selector.selects(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn list_meter_subjects(
        &self,
        namespace: &str,
        meter_slug: &str,
    ) -> BackendResult<Vec<String>> {
        let guard = self.rows.read().await;
        let subjects: BTreeSet<String> = guard
            .get(&(namespace.to_string(), meter_slug.to_string()))
            .into_iter()
            .flatten()
            .filter_map(|row| row.subject.clone())
            .collect();
        Ok(subjects.into_iter().collect())
    }
}
