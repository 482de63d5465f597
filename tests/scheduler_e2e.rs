// tests/scheduler_e2e.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;

use trend_brief_aggregator::aggregate::DailyStore;
use trend_brief_aggregator::ingest::providers::rss::RssProvider;
use trend_brief_aggregator::ingest::raw_cache::RawCache;
use trend_brief_aggregator::ingest::registry::SourceRegistry;
use trend_brief_aggregator::ingest::types::{SourceProvider, TrendItem};
use trend_brief_aggregator::scheduler::{self, run_scheduled_tick, SchedulerCfg};
use trend_brief_aggregator::summary::client::MockBackend;
use trend_brief_aggregator::summary::{SummaryCache, SummaryEngine};

const TECH_XML: &str = include_str!("fixtures/tech_feed.xml");
const MARKETS_XML: &str = include_str!("fixtures/markets_feed.xml");

fn fixture_registry() -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register(Box::new(RssProvider::from_fixture("tech", TECH_XML)));
    registry.register(Box::new(RssProvider::from_fixture("markets", MARKETS_XML)));
    registry
}

#[tokio::test]
async fn full_tick_fetches_merges_and_summarizes() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = fixture_registry();
    let raw_cache = RawCache::new(0); // always refetch
    let store = DailyStore::open(tmp.path().join("data")).unwrap();
    let summaries = Arc::new(SummaryCache::open(tmp.path().join("summaries")).unwrap());
    let engine = SummaryEngine::new(
        Arc::new(MockBackend {
            fixed: "Fixture briefing.".to_string(),
        }),
        Arc::clone(&summaries),
    );

    let cfg = SchedulerCfg {
        interval: Duration::from_secs(1800),
        fetch_timeout: Duration::from_secs(5),
    };

    let report = run_scheduled_tick(&cfg, &registry, &raw_cache, &store, Some(&engine)).await;
    assert_eq!(report.fetched_count(), 2);
    assert_eq!(report.failure_count(), 0);

    let today = Local::now().date_naive();
    let record = store.get(today).expect("today's record exists");
    assert_eq!(record.sources["tech"].len(), 3);
    assert_eq!(record.sources["markets"].len(), 2);

    let summary = summaries.latest(today).expect("summary generated");
    assert_eq!(summary.summary, "Fixture briefing.");
}

#[tokio::test]
async fn repeated_ticks_are_idempotent_on_the_daily_record() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = fixture_registry();
    let raw_cache = RawCache::new(0);
    let store = DailyStore::open(tmp.path().join("data")).unwrap();

    let cfg = SchedulerCfg {
        interval: Duration::from_secs(1800),
        fetch_timeout: Duration::from_secs(5),
    };

    run_scheduled_tick(&cfg, &registry, &raw_cache, &store, None).await;
    let today = Local::now().date_naive();
    let first = store.get(today).unwrap().item_count();

    run_scheduled_tick(&cfg, &registry, &raw_cache, &store, None).await;
    let second = store.get(today).unwrap().item_count();

    assert_eq!(first, second);
    assert_eq!(second, 5);
}

/// Provider slower than the scheduler interval, tracking how many fetches
/// run at once and how many ran in total.
struct SlowTrackingProvider {
    id: String,
    running: Arc<AtomicUsize>,
    max_concurrent: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceProvider for SlowTrackingProvider {
    async fn fetch_latest(&self) -> Result<Vec<TrendItem>> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![])
    }
    fn source_id(&self) -> &str {
        &self.id
    }
}

#[tokio::test]
async fn ticks_never_overlap_and_missed_ticks_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let running = Arc::new(AtomicUsize::new(0));
    let max_concurrent = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));

    let mut registry = SourceRegistry::new();
    registry.register(Box::new(SlowTrackingProvider {
        id: "slow".into(),
        running: Arc::clone(&running),
        max_concurrent: Arc::clone(&max_concurrent),
        calls: Arc::clone(&calls),
    }));

    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = scheduler::spawn(
        SchedulerCfg {
            // interval far shorter than one tick's duration
            interval: Duration::from_millis(10),
            fetch_timeout: Duration::from_secs(1),
        },
        Arc::new(registry),
        Arc::new(RawCache::new(0)),
        Arc::new(DailyStore::open(tmp.path()).unwrap()),
        None,
        rx,
    );

    tokio::time::sleep(Duration::from_millis(250)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("scheduler loop exits after shutdown")
        .unwrap();

    assert_eq!(max_concurrent.load(Ordering::SeqCst), 1, "ticks overlapped");

    // ~25 intervals came due, but each 50ms tick holds the loop and ticks
    // that came due mid-run are dropped, not queued: the call count tracks
    // tick duration, not the interval backlog.
    let n = calls.load(Ordering::SeqCst);
    assert!((2..=8).contains(&n), "expected skipped ticks, got {n} runs");
}

#[tokio::test]
async fn scheduler_stops_on_shutdown_signal() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(SourceRegistry::new());
    let raw_cache = Arc::new(RawCache::new(600));
    let store = Arc::new(DailyStore::open(tmp.path()).unwrap());
    let (tx, rx) = tokio::sync::watch::channel(false);

    let handle = scheduler::spawn(
        SchedulerCfg {
            interval: Duration::from_millis(10),
            fetch_timeout: Duration::from_millis(10),
        },
        registry,
        raw_cache,
        store,
        None,
        rx,
    );

    tokio::time::sleep(Duration::from_millis(30)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler loop exits after shutdown")
        .unwrap();
}
