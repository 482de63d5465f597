// src/summary/client.rs
//! Text-generation backends. The engine only sees `SummaryBackend`; the
//! concrete provider (OpenAI-compatible chat completions, mock for tests)
//! is chosen at boot from config.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[async_trait]
pub trait SummaryBackend: Send + Sync {
    /// Produce a summary for `input`. Any backend problem (timeout, quota,
    /// malformed response) surfaces as an error; the caller decides what to
    /// serve in the meantime.
    async fn generate(&self, input: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

pub type DynSummaryBackend = Arc<dyn SummaryBackend>;

/// Chat-completions backend against an OpenAI-compatible endpoint.
pub struct OpenAiBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

impl OpenAiBackend {
    pub fn new(api_key: &str, model: &str, api_base: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("trend-brief-aggregator/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            api_base: api_base
                .filter(|b| !b.trim().is_empty())
                .unwrap_or(DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

#[async_trait]
impl SummaryBackend for OpenAiBackend {
    async fn generate(&self, input: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        if self.api_key.is_empty() {
            return Err(anyhow!("summary backend has no api key"));
        }

        let sys = "You are a news briefing assistant. Summarize the day's trending \
                   headlines below into 2-3 short paragraphs. Keep a neutral tone, \
                   keep key names and figures, and output only the summary text.";
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: sys,
                },
                Msg {
                    role: "user",
                    content: input,
                },
            ],
            temperature: 0.7,
            max_tokens: 1000,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("sending chat completion request")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("backend returned status {status}"));
        }

        let body: Resp = resp.json().await.context("decoding chat completion")?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(anyhow!("backend returned an empty summary"));
        }
        Ok(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Deterministic backend for tests and local runs.
#[derive(Clone)]
pub struct MockBackend {
    pub fixed: String,
}

#[async_trait]
impl SummaryBackend for MockBackend {
    async fn generate(&self, _input: &str) -> Result<String> {
        Ok(self.fixed.clone())
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Build the configured backend, or `None` when summarization is disabled
/// or no api key is set.
pub fn build_backend(cfg: &AppConfig) -> Option<DynSummaryBackend> {
    if !cfg.enable_summary {
        return None;
    }
    if cfg.llm_api_key.is_empty() {
        tracing::warn!("ENABLE_SUMMARY is set but LLM_API_KEY is empty; summaries disabled");
        return None;
    }
    Some(Arc::new(OpenAiBackend::new(
        &cfg.llm_api_key,
        &cfg.llm_model,
        cfg.llm_api_base.as_deref(),
    )))
}
