// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

const ENV_SOURCES_PATH: &str = "SOURCES_CONFIG_PATH";

/// Process configuration, read once at boot from the environment
/// (`.env` is loaded first via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Scheduler period. Default 1800s (30 minutes).
    pub tick_interval_secs: u64,
    /// Per-source fetch timeout inside a tick. Default 20s.
    pub fetch_timeout_secs: u64,
    /// Raw cache freshness window. Default 600s.
    pub raw_cache_ttl_secs: u64,
    pub data_dir: PathBuf,
    pub bind_addr: String,
    pub enable_summary: bool,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_api_base: Option<String>,
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            tick_interval_secs: env_u64("TICK_INTERVAL_SECS", 1800),
            fetch_timeout_secs: env_u64("FETCH_TIMEOUT_SECS", 20),
            raw_cache_ttl_secs: env_u64("RAW_CACHE_TTL_SECS", 600),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            bind_addr: std::env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8000".to_string()),
            enable_summary: std::env::var("ENABLE_SUMMARY")
                .map(|v| v == "1")
                .unwrap_or(false),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or_default(),
            llm_model: std::env::var("LLM_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            llm_api_base: std::env::var("LLM_API_BASE").ok().filter(|v| !v.is_empty()),
        }
    }

    pub fn summaries_dir(&self) -> PathBuf {
        self.data_dir.join("summaries")
    }
}

/// One configured news source.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SourceSpec {
    pub id: String,
    pub feed_url: String,
}

/// Load the source list from an explicit path. Supports TOML or JSON.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Load the source list using env var + fallbacks:
/// 1) $SOURCES_CONFIG_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
pub fn load_sources_default() -> Result<Vec<SourceSpec>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("SOURCES_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceSpec>> {
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported sources config format"))
}

fn parse_toml(s: &str) -> Result<Vec<SourceSpec>> {
    #[derive(Deserialize)]
    struct TomlSources {
        sources: Vec<SourceSpec>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(clean_specs(v.sources))
}

fn parse_json(s: &str) -> Result<Vec<SourceSpec>> {
    let v: Vec<SourceSpec> = serde_json::from_str(s)?;
    Ok(clean_specs(v))
}

/// Drop entries with a blank id or url; on a duplicate id the first wins.
fn clean_specs(specs: Vec<SourceSpec>) -> Vec<SourceSpec> {
    use std::collections::HashSet;
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(specs.len());
    for mut spec in specs {
        spec.id = spec.id.trim().to_string();
        spec.feed_url = spec.feed_url.trim().to_string();
        if spec.id.is_empty() || spec.feed_url.is_empty() {
            continue;
        }
        if seen.insert(spec.id.clone()) {
            out.push(spec);
        }
    }
    out
}
