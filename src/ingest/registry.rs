// src/ingest/registry.rs
//! Static mapping from source id to its provider, built once at process
//! start from the sources config. Iteration order is stable (sorted by id)
//! so tick reports and merges happen in a deterministic order.

use std::collections::BTreeMap;

use crate::config::SourceSpec;
use crate::ingest::providers::rss::RssProvider;
use crate::ingest::types::SourceProvider;

#[derive(Default)]
pub struct SourceRegistry {
    providers: BTreeMap<String, Box<dyn SourceProvider>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later registrations under the same id replace earlier ones.
    pub fn register(&mut self, provider: Box<dyn SourceProvider>) {
        self.providers
            .insert(provider.source_id().to_string(), provider);
    }

    /// Build RSS providers for every configured source.
    pub fn from_specs(specs: &[SourceSpec]) -> Self {
        let mut registry = Self::new();
        for spec in specs {
            registry.register(Box::new(RssProvider::new(&spec.id, &spec.feed_url)));
        }
        registry
    }

    pub fn get(&self, source_id: &str) -> Option<&dyn SourceProvider> {
        self.providers.get(source_id).map(|p| p.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn SourceProvider)> {
        self.providers.iter().map(|(id, p)| (id.as_str(), p.as_ref()))
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
