// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::types::{SourceProvider, TrendItem};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
}

enum FeedSource {
    Remote { url: String, http: reqwest::Client },
    Fixture(String),
}

/// RSS-backed source. Item rank is the 1-based position in the feed, which
/// is how ranking feeds order their entries.
pub struct RssProvider {
    source_id: String,
    feed: FeedSource,
}

impl RssProvider {
    pub fn new(source_id: &str, feed_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("trend-brief-aggregator/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            source_id: source_id.to_string(),
            feed: FeedSource::Remote {
                url: feed_url.to_string(),
                http,
            },
        }
    }

    /// Parse a canned XML document instead of fetching. Used in tests.
    pub fn from_fixture(source_id: &str, content: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            feed: FeedSource::Fixture(content.to_string()),
        }
    }

    fn parse(&self, xml: &str) -> Result<Vec<TrendItem>> {
        let rss: Rss = from_str(xml)
            .with_context(|| format!("parsing rss xml for source {}", self.source_id))?;
        let fetched_at = Utc::now();
        let mut out = Vec::with_capacity(rss.channel.item.len());
        for (idx, it) in rss.channel.item.into_iter().enumerate() {
            let title = it.title.unwrap_or_default();
            if title.trim().is_empty() {
                continue;
            }
            out.push(TrendItem {
                rank: idx as u32 + 1,
                title,
                link: it.link.filter(|l| !l.trim().is_empty()),
                source_id: self.source_id.clone(),
                fetched_at,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<TrendItem>> {
        let xml = match &self.feed {
            FeedSource::Fixture(content) => content.clone(),
            FeedSource::Remote { url, http } => {
                let resp = http
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("fetching feed {url}"))?;
                let resp = resp
                    .error_for_status()
                    .with_context(|| format!("feed {url} returned error status"))?;
                resp.text().await.context("reading feed body")?
            }
        };
        self.parse(&xml)
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }
}
