// src/ingest/mod.rs
pub mod providers;
pub mod raw_cache;
pub mod registry;
pub mod types;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;

use crate::ingest::raw_cache::RawCache;
use crate::ingest::registry::SourceRegistry;
use crate::ingest::types::{SourceOutcome, TrendItem};

/// Normalize a title: decode HTML entities, strip tags, collapse whitespace.
pub fn normalize_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // Length cap: 500 chars
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }

    out
}

/// Result of one fetch pass across every registered source.
#[derive(Debug, Default)]
pub struct TickReport {
    pub outcomes: BTreeMap<String, SourceOutcome>,
}

impl TickReport {
    pub fn fetched_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, SourceOutcome::Fetched(_)))
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_failure()).count()
    }

    pub fn item_count(&self) -> usize {
        self.outcomes
            .values()
            .filter_map(|o| o.items())
            .map(|v| v.len())
            .sum()
    }
}

/// Normalize titles, pin the source id, and drop entries that normalize to
/// an empty title. Keeps the provider's ordering.
fn sanitize_items(source_id: &str, items: Vec<TrendItem>) -> Vec<TrendItem> {
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.title = normalize_title(&it.title);
        if it.title.is_empty() || it.rank == 0 {
            continue;
        }
        it.source_id = source_id.to_string();
        if let Some(link) = &it.link {
            if link.trim().is_empty() {
                it.link = None;
            }
        }
        out.push(it);
    }
    out
}

/// Run one fetch pass: every registered source concurrently, each with its
/// own timeout. A source that fails or times out never blocks the others;
/// its slot falls back to the raw cache's last-known-good value. Returns
/// only once every slot has settled.
pub async fn run_tick(
    registry: &SourceRegistry,
    raw_cache: &RawCache,
    fetch_timeout: Duration,
) -> TickReport {
    let now = Utc::now();

    let futs = registry.iter().map(|(id, provider)| {
        let id = id.to_string();
        async move {
            if let Some(entry) = raw_cache.get_fresh(&id, now) {
                tracing::debug!(source = %id, "raw cache fresh, skipping fetch");
                return (id, SourceOutcome::CachedFresh(entry.items));
            }

            let outcome = match tokio::time::timeout(fetch_timeout, provider.fetch_latest()).await
            {
                Ok(Ok(items)) => {
                    let items = sanitize_items(&id, items);
                    if items.is_empty() {
                        tracing::info!(source = %id, "source returned no items");
                        SourceOutcome::Empty
                    } else {
                        raw_cache.put(&id, items.clone());
                        SourceOutcome::Fetched(items)
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(source = %id, error = ?e, "source fetch failed");
                    fallback_outcome(raw_cache, &id)
                }
                Err(_) => {
                    tracing::warn!(source = %id, timeout_secs = fetch_timeout.as_secs(), "source fetch timed out");
                    fallback_outcome(raw_cache, &id)
                }
            };
            (id, outcome)
        }
    });

    let results = futures::future::join_all(futs).await;

    let mut report = TickReport::default();
    for (id, outcome) in results {
        report.outcomes.insert(id, outcome);
    }
    report
}

fn fallback_outcome(raw_cache: &RawCache, source_id: &str) -> SourceOutcome {
    match raw_cache.get(source_id) {
        Some(entry) => SourceOutcome::Fallback(entry.items),
        None => SourceOutcome::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_title_strips_tags_and_entities() {
        let s = "  <b>Hello&nbsp;&nbsp;world</b>  ";
        assert_eq!(normalize_title(s), "Hello world");
    }

    #[test]
    fn sanitize_drops_empty_titles_and_blank_links() {
        let items = vec![
            TrendItem {
                rank: 1,
                title: "<i></i>".into(),
                link: None,
                source_id: "x".into(),
                fetched_at: Utc::now(),
            },
            TrendItem {
                rank: 2,
                title: "Kept".into(),
                link: Some("  ".into()),
                source_id: "x".into(),
                fetched_at: Utc::now(),
            },
        ];
        let out = sanitize_items("s1", items);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Kept");
        assert_eq!(out[0].source_id, "s1");
        assert!(out[0].link.is_none());
    }
}
