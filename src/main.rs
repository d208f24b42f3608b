//! Meterscope API Server
//!
//! Run with: cargo run --bin meterscope -- --config config.toml
//!
//! # Configuration
//!
//! Settings come from the config file (or the default locations) with
//! `METERSCOPE_*` environment overrides; `--host` and `--port` win over
//! both. `RUST_LOG` takes precedence over the configured log level.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meterscope::api::{serve, ApiConfig, AppState};
use meterscope::backend::InMemoryBackend;
use meterscope::config::{Config, LoggingConfig};
use meterscope::meter::InMemoryCatalog;
use meterscope::service::QueryMeterService;

#[derive(Parser)]
#[command(name = "meterscope")]
#[command(author, version, about = "Meter query API server")]
struct Args {
    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    init_tracing(&config.logging);

    tracing::info!("Starting Meterscope API server v{}", env!("CARGO_PKG_VERSION"));

    let namespace = config.namespace.default.clone();

    let catalog = InMemoryCatalog::from_meters(&namespace, config.meters.clone())
        .context("invalid meter definition")?;
    tracing::info!(namespace = %namespace, meters = catalog.len(), "Meter catalog loaded");

    let backend = match &config.backend.fixtures {
        Some(path) => InMemoryBackend::from_fixture_file(path, &namespace)
            .await
            .with_context(|| format!("failed to load fixtures from {}", path.display()))?,
        None => {
            tracing::warn!("No backend fixtures configured, queries will return no rows");
            InMemoryBackend::new()
        }
    };

    let service = QueryMeterService::new(Arc::new(catalog), Arc::new(backend));

    let api_config = ApiConfig::from(&config.api);
    let state = AppState::new(service, namespace, api_config.clone());

    serve(state, &api_config).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("meterscope={},tower_http=info", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
