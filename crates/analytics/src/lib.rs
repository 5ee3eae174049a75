//! Warehouse query layer: renders the landing page events query and runs it
//! against the configured backend.

pub mod clickhouse_source;
pub mod fixture;
pub mod query;

pub use clickhouse_source::ClickHouseWarehouse;
pub use fixture::FixtureWarehouse;
pub use query::EventQuery;

use insights_core::config::{WarehouseBackend, WarehouseConfig};
use insights_core::{EventRecord, InsightsResult};

/// Configured event source.
#[derive(Clone)]
pub enum EventWarehouse {
    ClickHouse(ClickHouseWarehouse),
    Fixture(FixtureWarehouse),
}

impl EventWarehouse {
    pub fn from_config(config: &WarehouseConfig) -> Self {
        match config.backend {
            WarehouseBackend::ClickHouse => Self::ClickHouse(ClickHouseWarehouse::new(config)),
            WarehouseBackend::Fixture => Self::Fixture(FixtureWarehouse::new(&config.fixture_path)),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::ClickHouse(_) => "clickhouse",
            Self::Fixture(_) => "fixture",
        }
    }

    pub async fn fetch(&self, query: &EventQuery) -> InsightsResult<Vec<EventRecord>> {
        match self {
            Self::ClickHouse(w) => w.fetch(query).await,
            Self::Fixture(w) => w.fetch(query).await,
        }
    }

    pub async fn ping(&self) -> InsightsResult<()> {
        match self {
            Self::ClickHouse(w) => w.ping().await,
            Self::Fixture(w) => w.ping().await,
        }
    }
}
