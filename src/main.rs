mod config;
mod models;
mod services;
mod sources;

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Context;
use tokio::time::{interval, Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, DEFAULT_CONFIG_PATH};
use services::{PoolFetcher, RetryPolicy, ScanEngine, SnapshotStore};
use sources::hiro::HiroClient;

const CONFIG_ENV: &str = "DEX_POOL_CACHE_CONFIG";

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dex_pool_cache=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting DEX pool cache...");

    let path = config_path();
    let config = Config::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    tracing::info!("✓ Configuration loaded ({} exchanges)", config.exchanges.len());

    let cwd = std::env::current_dir().context("reading working directory")?;
    let cache_path = cwd.join(&config.storage.cache_file);
    tracing::info!("Working directory: {}", cwd.display());
    tracing::info!("Snapshot file: {}", cache_path.display());

    let store = Arc::new(SnapshotStore::new(cache_path));
    store.ensure_exists().context("initializing snapshot file")?;

    let client = HiroClient::new(&config.api.url, config.api.timeout())
        .context("building HTTP client")?;
    let fetcher = PoolFetcher::new(
        Arc::new(client),
        config.api.fetch_delay(),
        config.scan.retry_cooldown(),
    );
    let retry_policy = RetryPolicy {
        cooldown: config.scan.retry_cooldown(),
        max_attempts: config.scan.max_attempts,
    };

    let engine = Arc::new(ScanEngine::new(
        fetcher,
        store.clone(),
        config.exchanges.clone(),
        retry_policy,
        config.scan.restart_cooldown(),
    )?);

    let Some(scan) = engine.start() else {
        anyhow::bail!("scan loop did not start");
    };

    // Background: periodic status line
    let status_engine = engine.clone();
    let status_store = store.clone();
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let stats = status_store.stats();
            tracing::info!(
                "Status: {:?} | running={} | {} writes | {} bytes on disk",
                status_engine.phase(),
                status_engine.is_running(),
                stats.writes,
                stats.file_size_bytes
            );
        }
    });

    tokio::select! {
        result = scan => {
            result.context("scan loop stopped")?;
        }
        result = tokio::signal::ctrl_c() => {
            result.context("listening for shutdown signal")?;
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
