//! JSON file event source, for offline runs and demos.

use insights_core::{EventRecord, InsightsError, InsightsResult};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::query::EventQuery;

/// Reads a JSON array of [`EventRecord`]s and applies the query's date floor.
#[derive(Debug, Clone)]
pub struct FixtureWarehouse {
    path: PathBuf,
}

impl FixtureWarehouse {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn fetch(&self, query: &EventQuery) -> InsightsResult<Vec<EventRecord>> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            metrics::counter!("warehouse.errors").increment(1);
            InsightsError::Warehouse(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let mut records: Vec<EventRecord> = serde_json::from_str(&text).map_err(|e| {
            metrics::counter!("warehouse.errors").increment(1);
            InsightsError::Warehouse(format!("malformed fixture {}: {e}", self.path.display()))
        })?;
        records.retain(|r| r.event_date >= query.min_event_date());

        metrics::counter!("warehouse.fetches").increment(1);
        info!(path = %self.path.display(), rows = records.len(), "Fixture events loaded");
        Ok(records)
    }

    pub async fn ping(&self) -> InsightsResult<()> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| InsightsError::Warehouse(format!("{}: {e}", self.path.display())))
    }
}
