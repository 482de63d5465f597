// src/summary/mod.rs
//! Summary engine: fingerprints the current daily record and generates a
//! briefing only when the fingerprint is new. For a given fingerprint the
//! backend is invoked at most once, ever; identical content resolves to the
//! cached text. On backend failure the previous summary for the date stays
//! in place as last-known-good.

pub mod client;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::aggregate::{write_json_atomic, DailyRecord};
use crate::summary::client::DynSummaryBackend;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryRecord {
    pub date: NaiveDate,
    pub fingerprint: String,
    pub summary: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum SummaryError {
    /// The text-generation backend failed; last-known-good stays served.
    GenerationFailed(anyhow::Error),
}

impl fmt::Display for SummaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryError::GenerationFailed(e) => write!(f, "summary generation failed: {e}"),
        }
    }
}

impl std::error::Error for SummaryError {}

/// Deterministic digest of a daily record's content: source ids and ordered
/// item titles. Rank churn alone does not change it; a new or reworded title
/// does. Hex digest truncated to 16 chars.
pub fn fingerprint(record: &DailyRecord) -> String {
    let mut hasher = Sha256::new();
    for (source_id, items) in &record.sources {
        hasher.update(source_id.as_bytes());
        hasher.update([0x1f]);
        for item in items {
            hasher.update(item.title.as_bytes());
            hasher.update([0x1e]);
        }
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

/// Render the record as the text handed to the backend.
fn briefing_input(record: &DailyRecord) -> String {
    let mut out = String::new();
    for (source_id, items) in &record.sources {
        out.push_str("## ");
        out.push_str(source_id);
        out.push('\n');
        for item in items {
            out.push_str(&format!("{}. {}\n", item.rank, item.title));
        }
        out.push('\n');
    }
    out
}

#[derive(Default, Serialize, Deserialize)]
struct LatestIndex {
    /// date key -> fingerprint of the most recent successful summary.
    latest: HashMap<String, String>,
}

/// File-backed cache keyed by `(date, fingerprint)`, with a per-date pointer
/// to the most recent successful record. Layout under `dir`:
/// `<date>-<fingerprint>.json` per record, `latest.json` for the pointers.
pub struct SummaryCache {
    dir: PathBuf,
    inner: Mutex<CacheState>,
}

struct CacheState {
    records: HashMap<(NaiveDate, String), SummaryRecord>,
    latest: HashMap<NaiveDate, String>,
}

impl SummaryCache {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating summaries dir {}", dir.display()))?;

        let mut records = HashMap::new();
        for entry in fs::read_dir(&dir).context("listing summaries dir")? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json")
                || path.file_name().and_then(|n| n.to_str()) == Some("latest.json")
            {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|s| serde_json::from_str::<SummaryRecord>(&s).map_err(Into::into))
            {
                Ok(rec) => {
                    records.insert((rec.date, rec.fingerprint.clone()), rec);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = ?e, "skipping unreadable summary file");
                }
            }
        }

        let mut latest = HashMap::new();
        let index_path = dir.join("latest.json");
        if index_path.exists() {
            let idx: LatestIndex = serde_json::from_str(
                &fs::read_to_string(&index_path).context("reading latest.json")?,
            )
            .unwrap_or_default();
            for (k, fp) in idx.latest {
                if let Ok(date) = NaiveDate::parse_from_str(&k, "%Y-%m-%d") {
                    latest.insert(date, fp);
                }
            }
        }

        Ok(Self {
            dir,
            inner: Mutex::new(CacheState { records, latest }),
        })
    }

    pub fn get(&self, date: NaiveDate, fingerprint: &str) -> Option<SummaryRecord> {
        let state = self.inner.lock().expect("summary cache mutex poisoned");
        state.records.get(&(date, fingerprint.to_string())).cloned()
    }

    /// Most recent successful summary for a date, regardless of whether the
    /// record content has moved on since. This is the last-known-good value
    /// the presentation layer reads.
    pub fn latest(&self, date: NaiveDate) -> Option<SummaryRecord> {
        let state = self.inner.lock().expect("summary cache mutex poisoned");
        let fp = state.latest.get(&date)?.clone();
        state.records.get(&(date, fp)).cloned()
    }

    /// Record a generated summary. In-memory state is updated first and
    /// unconditionally: a failed disk write degrades durability only, never
    /// the at-most-once generation guarantee backed by the in-memory maps.
    pub fn store(&self, record: SummaryRecord) -> Result<()> {
        let path = self.dir.join(format!(
            "{}-{}.json",
            record.date.format("%Y-%m-%d"),
            record.fingerprint
        ));

        let mut state = self.inner.lock().expect("summary cache mutex poisoned");
        state
            .latest
            .insert(record.date, record.fingerprint.clone());
        state
            .records
            .insert((record.date, record.fingerprint.clone()), record.clone());

        let idx = LatestIndex {
            latest: state
                .latest
                .iter()
                .map(|(d, fp)| (d.format("%Y-%m-%d").to_string(), fp.clone()))
                .collect(),
        };
        drop(state);

        write_json_atomic(&path, &record)?;
        write_json_atomic(&self.dir.join("latest.json"), &idx)
    }
}

pub struct SummaryEngine {
    backend: DynSummaryBackend,
    cache: std::sync::Arc<SummaryCache>,
}

impl SummaryEngine {
    pub fn new(backend: DynSummaryBackend, cache: std::sync::Arc<SummaryCache>) -> Self {
        Self { backend, cache }
    }

    /// Summarize the record, reusing the cached text when the fingerprint is
    /// already known.
    pub async fn summarize(&self, record: &DailyRecord) -> Result<SummaryRecord, SummaryError> {
        let fp = fingerprint(record);
        if let Some(hit) = self.cache.get(record.date, &fp) {
            tracing::debug!(date = %record.date, fingerprint = %fp, "summary fingerprint hit");
            return Ok(hit);
        }

        let input = briefing_input(record);
        let text = self
            .backend
            .generate(&input)
            .await
            .map_err(SummaryError::GenerationFailed)?;

        let rec = SummaryRecord {
            date: record.date,
            fingerprint: fp.clone(),
            summary: text,
            generated_at: Utc::now(),
        };
        if let Err(e) = self.cache.store(rec.clone()) {
            tracing::warn!(error = ?e, "persisting summary record failed");
        }
        tracing::info!(
            date = %record.date,
            fingerprint = %fp,
            backend = self.backend.name(),
            "generated new summary"
        );
        Ok(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::TrendItem;

    fn record_with_titles(titles: &[(&str, u32)]) -> DailyRecord {
        let mut rec = DailyRecord::new(NaiveDate::from_ymd_opt(2026, 8, 24).unwrap());
        let items: Vec<TrendItem> = titles
            .iter()
            .map(|(t, r)| TrendItem {
                rank: *r,
                title: t.to_string(),
                link: None,
                source_id: "s1".into(),
                fetched_at: Utc::now(),
            })
            .collect();
        rec.merge_source("s1", &items);
        rec
    }

    #[test]
    fn fingerprint_is_stable_under_rank_change() {
        let a = record_with_titles(&[("A", 1), ("B", 2)]);
        let b = record_with_titles(&[("A", 5), ("B", 9)]);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_changes_with_titles() {
        let a = record_with_titles(&[("A", 1)]);
        let b = record_with_titles(&[("A", 1), ("B", 2)]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 16);
    }

    #[test]
    fn briefing_input_lists_ranked_titles_per_source() {
        let rec = record_with_titles(&[("A", 1), ("B", 2)]);
        let input = briefing_input(&rec);
        assert!(input.contains("## s1"));
        assert!(input.contains("1. A"));
        assert!(input.contains("2. B"));
    }
}
