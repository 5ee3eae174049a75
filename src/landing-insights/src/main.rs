//! Landing Insights: password-gated analytics dashboard for the landing page.
//!
//! Main entry point that loads configuration, wires the warehouse, cache,
//! sessions, and pipeline together, and starts the server.

use clap::Parser;
use insights_analytics::{EventQuery, EventWarehouse};
use insights_api::{ApiServer, AppState};
use insights_cache::CachedWarehouse;
use insights_core::config::{AppConfig, WarehouseBackend};
use insights_platform::{PasswordGate, SessionManager};
use insights_reporting::DashboardPipeline;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "landing-insights")]
#[command(about = "Password-gated analytics dashboard for the landing page")]
#[command(version)]
struct Cli {
    /// TOML config file (environment variables still override it)
    #[arg(long, env = "LANDING_INSIGHTS_CONFIG")]
    config: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "LANDING_INSIGHTS__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Serve events from a JSON fixture instead of ClickHouse
    #[arg(long)]
    fixture: Option<String>,

    /// Fetch events at startup instead of on the first dashboard request
    #[arg(long, default_value_t = false)]
    prefetch: bool,

    /// Disable the Prometheus exporter
    #[arg(long, default_value_t = false)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "landing_insights=info,insights=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Landing Insights starting up");

    // Load configuration
    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => {
            error!(error = %e, "Failed to load config file");
            return Err(e.into());
        }
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        }
    };

    // Apply CLI overrides
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(path) = cli.fixture {
        config.warehouse.backend = WarehouseBackend::Fixture;
        config.warehouse.fixture_path = path;
    }
    if cli.no_metrics {
        config.metrics.enabled = false;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        backend = ?config.warehouse.backend,
        "Configuration loaded"
    );

    let query = EventQuery::from_config(&config.warehouse)?;
    let warehouse = EventWarehouse::from_config(&config.warehouse);
    let source = Arc::new(CachedWarehouse::new(warehouse, query));

    if cli.prefetch {
        let records = source.records().await?;
        info!(rows = records.len(), "Events prefetched");
    }

    let pipeline = Arc::new(DashboardPipeline::from_config(&config.pipeline)?);
    let sessions = Arc::new(SessionManager::new(PasswordGate::new(
        config.auth.password.clone(),
    )));

    let state = AppState {
        sessions,
        source,
        pipeline,
        node_id: config.node_id.clone(),
        start_time: Instant::now(),
    };
    let api_server = ApiServer::new(config, state);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Landing Insights is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
