// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One trending entry as reported by a source on a single fetch.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct TrendItem {
    /// 1-based position in the source's current ranking.
    pub rank: u32,
    pub title: String,
    pub link: Option<String>,
    pub source_id: String,
    pub fetched_at: DateTime<Utc>,
}

/// A single news source. Implementations do one network fetch and return the
/// current ranked list; the orchestrator owns timeouts and failure isolation.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<TrendItem>>;
    fn source_id(&self) -> &str;
}

/// Per-source result of one orchestration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Fresh fetch succeeded; the raw cache was refreshed with these items.
    Fetched(Vec<TrendItem>),
    /// The raw cache was still within its TTL, so the network call was skipped.
    CachedFresh(Vec<TrendItem>),
    /// Fetch succeeded but returned zero items. Soft no-op for this tick.
    Empty,
    /// Fetch failed or timed out; last-known-good items from the raw cache.
    Fallback(Vec<TrendItem>),
    /// Fetch failed and no prior successful fetch exists to fall back on.
    Failed,
}

impl SourceOutcome {
    /// Items to hand to the daily aggregator for this source, if any.
    pub fn items(&self) -> Option<&[TrendItem]> {
        match self {
            SourceOutcome::Fetched(v)
            | SourceOutcome::CachedFresh(v)
            | SourceOutcome::Fallback(v) => Some(v),
            SourceOutcome::Empty | SourceOutcome::Failed => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SourceOutcome::Fallback(_) | SourceOutcome::Failed)
    }
}
