// src/aggregate/mod.rs
//! Daily aggregation: folds each tick's fetched items into a per-day record.
//! Within a day the record only grows; an item that drops off a source's live
//! ranking stays in the record with its last observed rank.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::normalize_title;
use crate::ingest::types::TrendItem;

/// One deduplicated entry in a day's record. Position in the per-source Vec
/// is first-seen order and never changes; `rank` and `fetched_at` track the
/// most recent fetch that contained the item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyItem {
    pub rank: u32,
    pub title: String,
    pub link: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    /// source id -> items in first-seen order.
    pub sources: BTreeMap<String, Vec<DailyItem>>,
}

/// Dedup identity. A stable link is the stronger identity and wins whenever
/// the incoming item carries one; the normalized title is the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ItemIdentity {
    Link(String),
    Title(String),
}

fn identity_of(link: Option<&str>, title: &str) -> ItemIdentity {
    match link {
        Some(l) if !l.trim().is_empty() => ItemIdentity::Link(l.trim().to_string()),
        _ => ItemIdentity::Title(normalize_title(title).to_lowercase()),
    }
}

fn stored_identity(item: &DailyItem) -> ItemIdentity {
    identity_of(item.link.as_deref(), &item.title)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub appended: usize,
    pub updated: usize,
}

impl DailyRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            sources: BTreeMap::new(),
        }
    }

    /// Fold one source's freshly fetched list into the record.
    ///
    /// Known items (by identity) are updated in place: rank and fetched_at
    /// always, title too on a link-identity match (the latest wording wins).
    /// Unknown items are appended in input order. Nothing is ever removed.
    /// A duplicate identity inside `items` itself keeps the first occurrence.
    pub fn merge_source(&mut self, source_id: &str, items: &[TrendItem]) -> MergeStats {
        let entries = self.sources.entry(source_id.to_string()).or_default();

        let mut index: HashMap<ItemIdentity, usize> = HashMap::with_capacity(entries.len());
        for (pos, entry) in entries.iter().enumerate() {
            index.insert(stored_identity(entry), pos);
        }

        let mut stats = MergeStats::default();
        let mut seen_this_fetch: HashSet<ItemIdentity> = HashSet::new();

        for item in items {
            let identity = identity_of(item.link.as_deref(), &item.title);
            if !seen_this_fetch.insert(identity.clone()) {
                // duplicate within one response: first occurrence wins
                continue;
            }

            match index.get(&identity) {
                Some(&pos) => {
                    let entry = &mut entries[pos];
                    entry.rank = item.rank;
                    entry.fetched_at = item.fetched_at;
                    if matches!(identity, ItemIdentity::Link(_)) {
                        entry.title = item.title.clone();
                    }
                    stats.updated += 1;
                }
                None => {
                    entries.push(DailyItem {
                        rank: item.rank,
                        title: item.title.clone(),
                        link: item.link.clone(),
                        first_seen: item.fetched_at,
                        fetched_at: item.fetched_at,
                    });
                    index.insert(identity, entries.len() - 1);
                    stats.appended += 1;
                }
            }
        }

        stats
    }

    pub fn item_count(&self) -> usize {
        self.sources.values().map(|v| v.len()).sum()
    }
}

/// File-backed store of daily records: one `data/<YYYY-MM-DD>.json` per day.
/// Existing files are loaded on open so a restart resumes the current day
/// instead of starting over.
#[derive(Debug)]
pub struct DailyStore {
    dir: PathBuf,
    inner: RwLock<BTreeMap<NaiveDate, DailyRecord>>,
}

impl DailyStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating data dir {}", dir.display()))?;

        let mut records = BTreeMap::new();
        for entry in fs::read_dir(&dir).context("listing data dir")? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
                continue;
            };
            match fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|s| serde_json::from_str::<DailyRecord>(&s).map_err(Into::into))
            {
                Ok(record) => {
                    records.insert(date, record);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = ?e, "skipping unreadable daily record");
                }
            }
        }

        Ok(Self {
            dir,
            inner: RwLock::new(records),
        })
    }

    /// Merge one source's items into the record for `date`, creating the
    /// record on a new day, and persist the result. Returns a copy of the
    /// updated record.
    pub fn merge(
        &self,
        date: NaiveDate,
        source_id: &str,
        items: &[TrendItem],
    ) -> Result<DailyRecord> {
        let mut map = self.inner.write().expect("daily store lock poisoned");
        let record = map.entry(date).or_insert_with(|| DailyRecord::new(date));
        let stats = record.merge_source(source_id, items);
        let snapshot = record.clone();
        drop(map);

        tracing::debug!(
            date = %date,
            source = source_id,
            appended = stats.appended,
            updated = stats.updated,
            "merged source into daily record"
        );

        write_json_atomic(&self.record_path(date), &snapshot)?;
        Ok(snapshot)
    }

    pub fn get(&self, date: NaiveDate) -> Option<DailyRecord> {
        let map = self.inner.read().expect("daily store lock poisoned");
        map.get(&date).cloned()
    }

    /// Available date keys, most recent first.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let map = self.inner.read().expect("daily store lock poisoned");
        map.keys().rev().copied().collect()
    }

    fn record_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }
}

pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value).context("serializing json")?;
    let mut f = fs::File::create(&tmp)
        .with_context(|| format!("creating {}", tmp.display()))?;
    f.write_all(json.as_bytes()).context("writing json")?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}
