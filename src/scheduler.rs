// src/scheduler.rs
//! Periodic tick driver: fetch -> merge -> summarize on a fixed interval.
//! Ticks never overlap: the loop awaits a full tick before asking the
//! interval for the next one, and a tick that comes due mid-run is skipped,
//! not queued. Shutdown is observed between ticks only, so an in-flight
//! merge always finishes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::aggregate::DailyStore;
use crate::ingest::raw_cache::RawCache;
use crate::ingest::registry::SourceRegistry;
use crate::ingest::{self, TickReport};
use crate::summary::{SummaryEngine, SummaryError};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

/// One full pass: fetch all sources, merge every settled slot into today's
/// record, refresh the summary. Per-source and summary failures are logged
/// and contained; the report is returned for tests and logging.
pub async fn run_scheduled_tick(
    cfg: &SchedulerCfg,
    registry: &SourceRegistry,
    raw_cache: &RawCache,
    store: &DailyStore,
    engine: Option<&SummaryEngine>,
) -> TickReport {
    let report = ingest::run_tick(registry, raw_cache, cfg.fetch_timeout).await;

    // Date key is resolved after the fetch settles so every merge in this
    // tick lands on the same record.
    let date = Local::now().date_naive();

    let mut merged_any = false;
    for (source_id, outcome) in &report.outcomes {
        let Some(items) = outcome.items() else {
            continue;
        };
        match store.merge(date, source_id, items) {
            Ok(_) => merged_any = true,
            Err(e) => {
                tracing::error!(source = %source_id, error = ?e, "merging into daily record failed");
            }
        }
    }

    if merged_any {
        if let (Some(engine), Some(record)) = (engine, store.get(date)) {
            match engine.summarize(&record).await {
                Ok(_) => {}
                Err(SummaryError::GenerationFailed(e)) => {
                    tracing::warn!(date = %date, error = ?e, "summary generation failed, serving last-known-good");
                }
            }
        }
    }

    tracing::info!(
        date = %date,
        fetched = report.fetched_count(),
        failed = report.failure_count(),
        items = report.item_count(),
        "tick completed"
    );
    report
}

/// Spawn the tick loop. The first tick runs immediately; the loop exits when
/// `shutdown` flips, after any in-flight tick has finished.
pub fn spawn(
    cfg: SchedulerCfg,
    registry: Arc<SourceRegistry>,
    raw_cache: Arc<RawCache>,
    store: Arc<DailyStore>,
    engine: Option<Arc<SummaryEngine>>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // shutdown wins over an already-due tick
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    tracing::info!("scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    run_scheduled_tick(
                        &cfg,
                        &registry,
                        &raw_cache,
                        &store,
                        engine.as_deref(),
                    )
                    .await;
                }
            }
        }
    })
}
