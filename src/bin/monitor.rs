use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use site_monitor::{
    api::{ApiConfig, ApiState, spawn_api_server},
    config::{Config, StorageConfig, read_config_file},
    events::{ConnectionRegistry, EventBroadcaster, bus::connect_bus},
    monitoring::{CHECK_INTERVAL, CycleRunner, CycleScheduler, ProtocolProbe},
    storage::{MemoryRegistry, TargetRegistry},
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); defaults apply when omitted
    #[arg(short)]
    file: Option<String>,
}

fn init(log_level: &str) {
    let level = log_level.parse().unwrap_or(LevelFilter::DEBUG);
    let filter = filter::Targets::new().with_targets(vec![
        ("site_monitor", level),
        ("tower_http", LevelFilter::INFO),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn open_registry(config: &Config) -> anyhow::Result<Arc<dyn TargetRegistry>> {
    match &config.storage {
        StorageConfig::None => {
            warn!("no storage configured, targets and outcomes are kept in memory only");
            Ok(Arc::new(MemoryRegistry::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let registry = site_monitor::storage::sqlite::SqliteRegistry::new(path)
                .await
                .with_context(|| format!("failed to open registry at {}", path.display()))?;
            Ok(Arc::new(registry))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite storage requested but the storage-sqlite feature is disabled")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = read_config_file(args.file.as_deref())?;
    init(&config.log_level);
    trace!("started with args: {args:?}");

    let registry = open_registry(&config).await?;
    info!("{}", registry.health_check().await?);

    let connections = ConnectionRegistry::new();
    let bus = connect_bus(&config.bus, connections.clone()).await;
    info!("event bus: {} (connected: {})", bus.name(), bus.is_connected());

    let broadcaster = EventBroadcaster::new(bus.clone(), connections);
    let probe = Arc::new(ProtocolProbe::new()?);
    let runner = Arc::new(CycleRunner::new(registry.clone(), probe, broadcaster.clone()));
    let scheduler = Arc::new(CycleScheduler::new(runner, CHECK_INTERVAL));

    if config.autostart {
        info!("{}", scheduler.start().await.message());
    }

    let state = ApiState::new(registry.clone(), broadcaster, scheduler);
    spawn_api_server(ApiConfig::from(&config), state).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");

    bus.close().await;
    registry.close().await?;

    Ok(())
}
