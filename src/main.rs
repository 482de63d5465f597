//! Trend Brief Aggregator — Binary Entrypoint
//! Boots the fetch/merge/summarize pipeline and the read-only HTTP API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_brief_aggregator::aggregate::DailyStore;
use trend_brief_aggregator::api::{self, AppState};
use trend_brief_aggregator::config::{self, AppConfig};
use trend_brief_aggregator::ingest::raw_cache::RawCache;
use trend_brief_aggregator::ingest::registry::SourceRegistry;
use trend_brief_aggregator::scheduler::{self, SchedulerCfg};
use trend_brief_aggregator::summary::client::build_backend;
use trend_brief_aggregator::summary::{SummaryCache, SummaryEngine};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trend_brief_aggregator=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    let specs = config::load_sources_default()?;
    if specs.is_empty() {
        tracing::warn!("no sources configured; ticks will fetch nothing");
    }

    let registry = Arc::new(SourceRegistry::from_specs(&specs));
    let raw_cache = Arc::new(RawCache::new(cfg.raw_cache_ttl_secs));
    let store = Arc::new(DailyStore::open(&cfg.data_dir)?);
    let summaries = Arc::new(SummaryCache::open(cfg.summaries_dir())?);

    let engine = build_backend(&cfg)
        .map(|backend| Arc::new(SummaryEngine::new(backend, Arc::clone(&summaries))));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = scheduler::spawn(
        SchedulerCfg {
            interval: Duration::from_secs(cfg.tick_interval_secs),
            fetch_timeout: Duration::from_secs(cfg.fetch_timeout_secs),
        },
        Arc::clone(&registry),
        Arc::clone(&raw_cache),
        Arc::clone(&store),
        engine,
        shutdown_rx,
    );
    tracing::info!(
        sources = registry.len(),
        interval_secs = cfg.tick_interval_secs,
        "scheduler started"
    );

    let router = api::create_router(AppState {
        store: Arc::clone(&store),
        summaries: Arc::clone(&summaries),
    });

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!(addr = %cfg.bind_addr, "serving read api");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Let an in-flight tick finish its merge before exiting.
    let _ = shutdown_tx.send(true);
    let _ = scheduler_handle.await;
    Ok(())
}
